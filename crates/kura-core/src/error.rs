use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to walk directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("No such directory: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid bucket location: {0}")]
    InvalidLocation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bucket unavailable: {0}")]
    BucketUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
