pub mod config;
pub mod error;
pub mod lister;
pub mod local;
pub mod location;
pub mod progress;
pub mod s3;
pub mod staleness;
pub mod storage;
pub mod sync;
pub mod transfer;
pub mod tree;
pub mod utils;

#[cfg(test)]
mod test_log;

pub use error::{Error, Result};
pub use location::BucketLocation;
pub use progress::{ConsoleProgress, LogProgress, ProgressObserver, ProgressStyle, SilentProgress};
pub use storage::ObjectStore;
pub use sync::{SyncItem, SyncOptions, SyncPlan, SyncReport, TransferOutcome};
pub use tree::DirectorySummary;
