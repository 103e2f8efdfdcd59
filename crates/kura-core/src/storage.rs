use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// オブジェクトのメタデータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// サイズ（バイト）
    pub size: u64,
    /// 最終更新日時
    pub last_modified: Option<DateTime<Utc>>,
}

/// 一覧取得で返るオブジェクト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

/// 一覧取得の 1 ページ
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    /// 次のページを取得するためのトークン（最後のページなら None）
    pub continuation: Option<String>,
}

/// オブジェクトストレージの共通インターフェース
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// バケットが存在するか確認
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// バケットを作成
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// バケットがなければ作成
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_exists(bucket).await? {
            return Ok(());
        }
        tracing::info!(bucket, "creating bucket");
        self.create_bucket(bucket).await
    }

    /// オブジェクトのメタデータを取得
    ///
    /// オブジェクトが存在しない場合のみ `Ok(None)`。それ以外の失敗は `Err`。
    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>>;

    /// ファイルをアップロード
    async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// オブジェクトを `local_path` にダウンロード（親ディレクトリは作成済みであること）
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;

    /// `prefix` 以下のオブジェクトを 1 ページ分取得
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// ストレージ名（ログ用）
    fn name(&self) -> &str;
}

/// バケットが存在しなければ `BucketUnavailable` を返す
pub async fn require_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    if store.bucket_exists(bucket).await? {
        Ok(())
    } else {
        Err(Error::BucketUnavailable(format!(
            "bucket '{}' does not exist on {}",
            bucket,
            store.name()
        )))
    }
}
