use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::location::local_path_for;
use crate::storage::{ListPage, ObjectMeta, ObjectStore, ObjectSummary};
use crate::{tree, Error, Result};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// ローカルディレクトリをストレージとして扱うバックエンド
///
/// `root` 直下のディレクトリがバケット、その中のファイルがオブジェクトになる。
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// 1 ページあたりの件数を変更
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
            return Err(Error::InvalidPath(format!("invalid bucket name: {}", bucket)));
        }
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let bucket_path = self.bucket_path(bucket)?;
        let path = local_path_for(&bucket_path, key)?;
        if path == bucket_path {
            return Err(Error::InvalidPath(format!("invalid object key: '{}'", key)));
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match tokio::fs::metadata(self.bucket_path(bucket)?).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.bucket_path(bucket)?).await?;
        Ok(())
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>> {
        match tokio::fs::metadata(self.object_path(bucket, key)?).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(ObjectMeta {
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(local_path, &path).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        tokio::fs::copy(&path, local_path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::Storage(format!("no such object: {}/{}", bucket, key))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let bucket_path = self.bucket_path(bucket)?;
        let prefix = prefix.to_string();
        let page_size = self.page_size;

        tokio::task::spawn_blocking(move || list_sorted(&bucket_path, &prefix, continuation, page_size))
            .await
            .map_err(|e| Error::Storage(format!("listing task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "local"
    }
}

fn list_sorted(
    bucket_path: &Path,
    prefix: &str,
    start_after: Option<String>,
    page_size: usize,
) -> Result<ListPage> {
    if !bucket_path.is_dir() {
        return Err(Error::Storage(format!(
            "no such bucket: {}",
            bucket_path.display()
        )));
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(bucket_path).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let key = tree::relative_path(bucket_path, entry.path())?;
        if !key.starts_with(prefix) {
            continue;
        }
        if let Some(after) = &start_after {
            if key.as_str() <= after.as_str() {
                continue;
            }
        }
        objects.push(ObjectSummary {
            key,
            size: entry.metadata()?.len(),
        });
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));

    let continuation = if objects.len() > page_size {
        objects.truncate(page_size);
        objects.last().map(|o| o.key.clone())
    } else {
        None
    };

    Ok(ListPage {
        objects,
        continuation,
    })
}
