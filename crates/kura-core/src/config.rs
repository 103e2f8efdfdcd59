use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::local::LocalStore;
use crate::progress::ProgressStyle;
use crate::s3::{S3Options, S3Store};
use crate::storage::ObjectStore;
use crate::sync::SyncOptions;
use crate::Result;

/// Kura 設定
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub storage: Option<StorageConfig>,
    pub s3: Option<S3Config>,
    pub sync: Option<SyncConfig>,
    pub progress: Option<ProgressConfig>,
}

/// Storage 設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// ストレージバックエンド ("s3" or "local")
    #[serde(default = "default_backend")]
    pub backend: String,
    /// ローカルバックエンドのルートディレクトリ（backend="local"の場合に使用）
    pub local_root: Option<PathBuf>,
}

/// S3 設定（認証情報は AWS の標準の環境変数・共有設定から読む）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3Config {
    pub region: Option<String>,
    /// S3 互換サービスのエンドポイント
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

/// 同期設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 同時転送数
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// 進捗表示の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_complete")]
    pub complete: char,
    #[serde(default = "default_incomplete")]
    pub incomplete: char,
}

fn default_backend() -> String {
    "s3".to_string()
}

fn default_jobs() -> usize {
    1
}

fn default_width() -> usize {
    ProgressStyle::default().width
}

fn default_complete() -> char {
    ProgressStyle::default().complete
}

fn default_incomplete() -> char {
    ProgressStyle::default().incomplete
}

impl Config {
    /// 設定ファイルのパスを取得
    pub fn config_path() -> Result<PathBuf> {
        let home = env::var("HOME")
            .map_err(|_| crate::Error::Config("HOME environment variable not set".into()))?;
        Ok(PathBuf::from(home).join(".kura").join("config.toml"))
    }

    /// 設定を読み込み
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// 指定したファイルから設定を読み込み（ファイルがなければデフォルト）
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            crate::Error::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            crate::Error::Config(format!("Failed to parse config file: {}", e))
        })?;

        Ok(config)
    }

    /// 設定を保存
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // ディレクトリを作成
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, self.to_toml()?).map_err(|e| {
            crate::Error::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// TOML 文字列に変換
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// すべてのセクションを埋めた設定（config init 用）
    pub fn example() -> Self {
        Config {
            storage: Some(StorageConfig {
                backend: default_backend(),
                local_root: None,
            }),
            s3: Some(S3Config::default()),
            sync: Some(SyncConfig {
                jobs: default_jobs(),
                follow_symlinks: false,
            }),
            progress: Some(ProgressConfig {
                width: default_width(),
                complete: default_complete(),
                incomplete: default_incomplete(),
            }),
        }
    }

    /// ストレージバックエンド名を取得（環境変数優先）
    pub fn get_storage_backend(&self) -> String {
        env::var("KURA_BACKEND").ok().unwrap_or_else(|| {
            self.storage
                .as_ref()
                .map(|s| s.backend.clone())
                .unwrap_or_else(default_backend)
        })
    }

    /// ローカルバックエンドのルートを取得（環境変数優先）
    pub fn get_local_root(&self) -> Result<PathBuf> {
        env::var_os("KURA_LOCAL_ROOT")
            .map(PathBuf::from)
            .or_else(|| self.storage.as_ref().and_then(|s| s.local_root.clone()))
            .ok_or_else(|| {
                crate::Error::Config(
                    "KURA_LOCAL_ROOT not found in environment or config".into(),
                )
            })
    }

    /// S3 接続設定を取得（エンドポイントは環境変数優先）
    pub fn s3_options(&self) -> S3Options {
        let s3 = self.s3.clone().unwrap_or_default();
        S3Options {
            region: s3.region,
            endpoint: env::var("KURA_S3_ENDPOINT").ok().or(s3.endpoint),
            force_path_style: s3.force_path_style,
        }
    }

    /// 同期オプションを取得
    pub fn sync_options(&self) -> SyncOptions {
        self.sync
            .as_ref()
            .map(|s| SyncOptions {
                jobs: s.jobs.max(1),
                follow_symlinks: s.follow_symlinks,
            })
            .unwrap_or_default()
    }

    /// 進捗表示のスタイルを取得
    pub fn progress_style(&self) -> Result<ProgressStyle> {
        let Some(progress) = &self.progress else {
            return Ok(ProgressStyle::default());
        };

        if progress.width == 0 {
            return Err(crate::Error::Config(
                "progress.width must be greater than 0".into(),
            ));
        }

        Ok(ProgressStyle {
            width: progress.width,
            complete: progress.complete,
            incomplete: progress.incomplete,
        })
    }

    /// ObjectStore を作成
    pub async fn create_store(&self, backend: &str) -> Result<Box<dyn ObjectStore>> {
        match backend {
            "s3" => {
                let store = S3Store::connect(&self.s3_options()).await?;
                Ok(Box::new(store))
            }
            "local" => {
                let store = LocalStore::new(self.get_local_root()?);
                tracing::info!(root = %store.root().display(), "using local storage backend");
                Ok(Box::new(store))
            }
            _ => Err(crate::Error::Config(format!(
                "Unknown storage backend: {}",
                backend
            ))),
        }
    }
}
