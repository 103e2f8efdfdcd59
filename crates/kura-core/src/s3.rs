use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use crate::storage::{ListPage, ObjectMeta, ObjectStore, ObjectSummary};
use crate::{Error, Result};

/// S3 互換ストレージの接続設定
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// リージョン（未指定なら AWS の標準の解決順序に従う）
    pub region: Option<String>,
    /// エンドポイント（MinIO や R2 など）
    pub endpoint: Option<String>,
    /// パス形式のアドレッシングを使う
    pub force_path_style: bool,
}

/// aws-sdk-s3 を使ったバックエンド
pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    /// 環境変数・共有設定から認証情報を読み込んでクライアントを作成
    pub async fn connect(options: &S3Options) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(options.force_path_style)
            .build();

        tracing::debug!(
            region = ?shared.region(),
            endpoint = ?options.endpoint,
            "S3 client configured"
        );

        Ok(Self::from_client(S3Client::from_conf(config)))
    }

    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }

    fn region(&self) -> Option<String> {
        self.client.config().region().map(|r| r.to_string())
    }
}

fn storage_error<E: std::error::Error>(context: &str, error: E) -> Error {
    Error::Storage(format!("{}: {}", context, DisplayErrorContext(error)))
}

fn to_chrono(time: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::BucketUnavailable(format!(
                        "{}: {}",
                        bucket,
                        DisplayErrorContext(service_error)
                    )))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 は LocationConstraint を指定するとエラーになる
        if let Some(region) = self.region().filter(|r| r != "us-east-1") {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_bucket_already_owned_by_you() {
                    Ok(())
                } else if service_error.is_bucket_already_exists() {
                    Err(Error::BucketUnavailable(format!(
                        "bucket '{}' is owned by another account",
                        bucket
                    )))
                } else {
                    Err(Error::BucketUnavailable(format!(
                        "failed to create bucket '{}': {}",
                        bucket,
                        DisplayErrorContext(service_error)
                    )))
                }
            }
        }
    }

    async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(response) => Ok(Some(ObjectMeta {
                size: response.content_length().unwrap_or(0).max(0) as u64,
                last_modified: response.last_modified().and_then(to_chrono),
            })),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(storage_error(&format!("head {}", key), service_error))
                }
            }
        }
    }

    async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| storage_error(&format!("read {}", local_path.display()), e))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| storage_error(&format!("put {}", key), e))?;

        tracing::debug!(bucket, key, "uploaded object");
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error(&format!("get {}", key), e))?;

        let mut file = tokio::fs::File::create(local_path).await?;
        let mut body = response.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| storage_error(&format!("read body of {}", key), e))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(bucket, key, "downloaded object");
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| storage_error(&format!("list {}/{}", bucket, prefix), e))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectSummary {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        let continuation = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            continuation,
        })
    }

    fn name(&self) -> &str {
        "s3"
    }
}
