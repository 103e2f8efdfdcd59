use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

/// `<bucket>::<directory>` 形式のリモートの場所
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    /// バケット名
    pub bucket: String,
    /// バケット内のディレクトリ（キーのプレフィックス）
    pub directory: String,
}

impl BucketLocation {
    pub fn new(bucket: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            directory: directory.into(),
        }
    }

    /// 相対パスに対応するオブジェクトキー
    pub fn key_for(&self, relative_path: &str) -> String {
        join_key(&self.directory, relative_path)
    }

    /// 一覧取得に使うプレフィックス（`photos` が `photos2/` に一致しないよう `/` で終える）
    pub fn list_prefix(&self) -> String {
        let trimmed = self.directory.trim_end_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        }
    }
}

impl FromStr for BucketLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split("::").collect();
        match parts.as_slice() {
            [bucket, directory] if !bucket.is_empty() && !directory.is_empty() => {
                Ok(Self::new(*bucket, *directory))
            }
            _ => Err(Error::InvalidLocation(format!(
                "expected <bucket>::<directory>, got '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for BucketLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.bucket, self.directory)
    }
}

/// プレフィックスと相対パスを `/` で連結してオブジェクトキーを作る
pub fn join_key(prefix: &str, relative_path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let relative_path = relative_path.trim_start_matches('/');

    match (prefix.is_empty(), relative_path.is_empty()) {
        (true, _) => relative_path.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, relative_path),
    }
}

/// オブジェクトキーから `prefix` 以下の相対パスを取り出す
///
/// `prefix` の外側のキーや、`/` で終わるフォルダマーカーは `None`。
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let rest = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix)?
    };
    let rest = rest.trim_start_matches('/');

    if rest.is_empty() || rest.ends_with('/') {
        None
    } else {
        Some(rest)
    }
}

/// 相対キーを復元先ディレクトリ内のパスに変換
///
/// `..` などで復元先の外に出るキーは拒否する。
pub fn local_path_for(destination: &Path, relative_key: &str) -> Result<PathBuf> {
    let mut path = destination.to_path_buf();

    for part in relative_key.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(Error::InvalidPath(format!(
                    "object key escapes the destination: {}",
                    relative_key
                )))
            }
            part if Path::new(part).components().count() != 1 || Path::new(part).has_root() => {
                return Err(Error::InvalidPath(format!(
                    "unsupported object key: {}",
                    relative_key
                )))
            }
            part => path.push(part),
        }
    }

    Ok(path)
}
