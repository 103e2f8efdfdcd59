use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::{self, FutureExt};
use futures::stream::{Stream, StreamExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::location::{local_path_for, relative_key, BucketLocation};
use crate::progress::{ProgressObserver, SyncTotals};
use crate::storage::{self, ObjectStore, ObjectSummary};
use crate::tree::{self, DirectorySummary, LocalFile};
use crate::{lister, staleness, transfer, Error, Result};

/// 走査結果をワーカーへ渡すチャネルの容量
const WALK_BUFFER: usize = 256;

/// 1 回の転送単位
#[derive(Debug, Clone)]
pub struct SyncItem {
    /// ルート（またはバケット内ディレクトリ）からの相対パス
    pub relative_path: String,
    /// ローカル側のパス
    pub local_path: PathBuf,
    /// リモート側のオブジェクトキー
    pub key: String,
    /// 転送元でのサイズ（バイト）
    pub size: u64,
    /// ローカルの最終更新日時（バックアップ時のみ）
    pub modified: Option<DateTime<Utc>>,
}

impl SyncItem {
    fn from_local(file: LocalFile, location: &BucketLocation) -> Self {
        Self {
            key: location.key_for(&file.relative_path),
            relative_path: file.relative_path,
            local_path: file.path,
            size: file.size,
            modified: file.modified,
        }
    }
}

/// スキップした理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyUpToDate,
}

/// 1 アイテムの処理結果
#[derive(Debug)]
pub enum TransferOutcome {
    Skipped(SkipReason),
    Transferred,
    Failed(Error),
}

impl TransferOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TransferOutcome::Skipped(_) => "skipped",
            TransferOutcome::Transferred => "transferred",
            TransferOutcome::Failed(_) => "failed",
        }
    }
}

/// 同期全体の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub transferred: u64,
    pub skipped: u64,
    pub failed: u64,
    /// 実際に転送したバイト数
    pub transferred_bytes: u64,
}

impl SyncReport {
    fn record(&mut self, item: &SyncItem, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Transferred => {
                self.transferred += 1;
                self.transferred_bytes += item.size;
            }
            TransferOutcome::Skipped(_) => self.skipped += 1,
            TransferOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// 処理したアイテム数
    pub fn processed(&self) -> u64 {
        self.transferred + self.skipped + self.failed
    }

    /// 失敗が 1 件もなければ true
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// 同期のオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// 同時に転送するアイテム数（1 なら逐次処理）
    pub jobs: usize,
    /// シンボリックリンクをたどる
    pub follow_symlinks: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            follow_symlinks: false,
        }
    }
}

enum Direction {
    Backup {
        source: PathBuf,
        location: BucketLocation,
    },
    Restore {
        location: BucketLocation,
        destination: PathBuf,
    },
}

/// 事前チェックと集計を終えた同期
///
/// `backup` / `restore` でバケットの確認と転送元の集計を行い、`run` で
/// 転送する。事前チェックの失敗はここで `Err` になり、転送は一切行われない。
pub struct SyncPlan<'a> {
    store: &'a dyn ObjectStore,
    direction: Direction,
    summary: DirectorySummary,
    options: SyncOptions,
}

impl<'a> SyncPlan<'a> {
    /// ローカル -> リモート
    ///
    /// バケットがなければ作成する。
    pub async fn backup(
        store: &'a dyn ObjectStore,
        source: impl Into<PathBuf>,
        location: BucketLocation,
        options: SyncOptions,
    ) -> Result<Self> {
        store.ensure_bucket(&location.bucket).await?;
        tracing::debug!(bucket = %location.bucket, "bucket ready");

        let source = source.into();
        let root = source.clone();
        let follow_symlinks = options.follow_symlinks;
        let summary = tokio::task::spawn_blocking(move || tree::summarize(&root, follow_symlinks))
            .await
            .map_err(join_error)??;
        tracing::debug!(?summary, source = %source.display(), "summarized source");

        Ok(Self {
            store,
            direction: Direction::Backup { source, location },
            summary,
            options,
        })
    }

    /// リモート -> ローカル
    ///
    /// バケットが存在しない場合は失敗する。復元は更新日時に関係なく常に行う。
    pub async fn restore(
        store: &'a dyn ObjectStore,
        location: BucketLocation,
        destination: impl Into<PathBuf>,
        options: SyncOptions,
    ) -> Result<Self> {
        storage::require_bucket(store, &location.bucket).await?;
        tracing::debug!(bucket = %location.bucket, "bucket ready");

        let destination = destination.into();
        if !destination.is_dir() {
            return Err(Error::NotFound(destination));
        }

        let summary =
            lister::summarize_remote(store, &location.bucket, &location.list_prefix()).await?;
        tracing::debug!(?summary, location = %location, "summarized bucket directory");

        Ok(Self {
            store,
            direction: Direction::Restore {
                location,
                destination,
            },
            summary,
            options,
        })
    }

    /// 転送元の集計結果
    pub fn summary(&self) -> &DirectorySummary {
        &self.summary
    }

    /// 全アイテムを転送
    ///
    /// 個々のアイテムの失敗は `SyncReport::failed` に数えられ、処理は続行する。
    /// `Err` になるのは転送元の列挙そのものが失敗した場合だけ。
    pub async fn run(self, observer: &mut dyn ProgressObserver) -> Result<SyncReport> {
        let totals = SyncTotals::from(&self.summary);
        observer.on_started(&totals);

        let report = match &self.direction {
            Direction::Backup { source, location } => {
                self.run_backup(source, location, observer).await?
            }
            Direction::Restore {
                location,
                destination,
            } => self.run_restore(location, destination, observer).await?,
        };

        tracing::info!(
            transferred = report.transferred,
            skipped = report.skipped,
            failed = report.failed,
            "sync done"
        );
        observer.on_finished(&report);
        Ok(report)
    }

    async fn run_backup(
        &self,
        source: &Path,
        location: &BucketLocation,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SyncReport> {
        let (tx, rx) = mpsc::channel(WALK_BUFFER);
        let root = source.to_path_buf();
        let follow_symlinks = self.options.follow_symlinks;

        let walker = tokio::task::spawn_blocking(move || -> Result<()> {
            for file in tree::walk(&root, follow_symlinks)? {
                if tx.blocking_send(file).is_err() {
                    // 受信側が破棄された（キャンセル）
                    break;
                }
            }
            Ok(())
        });

        let store = self.store;
        let bucket = location.bucket.as_str();
        let items = ReceiverStream::new(rx).map(|file| Ok(SyncItem::from_local(file, location)));

        let report = drive(
            items,
            self.options.jobs,
            move |item: SyncItem| async move {
                let outcome = backup_item(store, bucket, &item).await;
                (item, outcome)
            },
            observer,
        )
        .await?;

        walker.await.map_err(join_error)??;
        Ok(report)
    }

    async fn run_restore(
        &self,
        location: &BucketLocation,
        destination: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SyncReport> {
        let store = self.store;
        let bucket = location.bucket.as_str();
        let prefix = location.list_prefix();
        let prefix = prefix.as_str();

        let objects = lister::list_objects(store, bucket, prefix)
            .try_filter(move |object| future::ready(relative_key(prefix, &object.key).is_some()));

        drive(
            objects,
            self.options.jobs,
            move |object: ObjectSummary| restore_item(store, bucket, prefix, destination, object),
            observer,
        )
        .await
    }
}

/// アイテムを最大 `jobs` 件ずつ並行に処理し、完了順に observer へ通知する
///
/// 通知と集計はこのループだけが行うので、observer が同時に呼ばれることはない。
async fn drive<T, S, F, Fut>(
    items: S,
    jobs: usize,
    mut process: F,
    observer: &mut dyn ProgressObserver,
) -> Result<SyncReport>
where
    S: Stream<Item = Result<T>>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = (SyncItem, TransferOutcome)>,
{
    let mut report = SyncReport::default();

    let completions = items
        .map_ok(move |item| process(item).map(Ok::<_, Error>))
        .try_buffer_unordered(jobs.max(1));
    futures::pin_mut!(completions);

    while let Some((item, outcome)) = completions.try_next().await? {
        report.record(&item, &outcome);
        observer.on_item_completed(&item, &outcome);
    }

    Ok(report)
}

async fn backup_item(store: &dyn ObjectStore, bucket: &str, item: &SyncItem) -> TransferOutcome {
    match staleness::check(store, bucket, &item.key, item.modified).await {
        Ok(true) => transfer::upload(store, bucket, item).await,
        Ok(false) => {
            tracing::trace!(path = %item.relative_path, "up to date");
            TransferOutcome::Skipped(SkipReason::AlreadyUpToDate)
        }
        Err(e) => {
            tracing::debug!(key = %item.key, error = %e, "failed to look up remote object");
            TransferOutcome::Failed(e)
        }
    }
}

async fn restore_item(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    destination: &Path,
    object: ObjectSummary,
) -> (SyncItem, TransferOutcome) {
    let relative_path = relative_key(prefix, &object.key)
        .unwrap_or(object.key.as_str())
        .to_string();

    let mut item = SyncItem {
        relative_path,
        local_path: destination.to_path_buf(),
        key: object.key,
        size: object.size,
        modified: None,
    };

    match local_path_for(destination, &item.relative_path) {
        Ok(path) => {
            item.local_path = path;
            let outcome = transfer::download(store, bucket, &item).await;
            (item, outcome)
        }
        Err(e) => {
            tracing::debug!(key = %item.key, error = %e, "refusing to restore object");
            (item, TransferOutcome::Failed(e))
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalStore;
    use crate::progress::{ConsoleProgress, ProgressStyle, SilentProgress};
    use crate::storage::{ListPage, ObjectMeta};
    use crate::utils::format_size;
    use async_trait::async_trait;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// 完了通知を記録する observer
    #[derive(Default)]
    struct Recorder {
        totals: Option<SyncTotals>,
        completed: Vec<(String, &'static str)>,
        finished: Option<SyncReport>,
    }

    impl ProgressObserver for Recorder {
        fn on_started(&mut self, totals: &SyncTotals) {
            self.totals = Some(*totals);
        }

        fn on_item_completed(&mut self, item: &SyncItem, outcome: &TransferOutcome) {
            self.completed
                .push((item.relative_path.clone(), outcome.label()));
        }

        fn on_finished(&mut self, report: &SyncReport) {
            self.finished = Some(*report);
        }
    }

    /// 特定のキーで失敗するストア
    struct FlakyStore {
        inner: LocalStore,
        failing_upload: Option<String>,
        failing_stat: Option<String>,
    }

    impl FlakyStore {
        fn new(root: &Path) -> Self {
            Self {
                inner: LocalStore::new(root),
                failing_upload: None,
                failing_stat: None,
            }
        }
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            self.inner.bucket_exists(bucket).await
        }

        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.inner.create_bucket(bucket).await
        }

        async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>> {
            if self.failing_stat.as_deref() == Some(key) {
                return Err(Error::Storage("timed out".into()));
            }
            self.inner.stat(bucket, key).await
        }

        async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
            if self.failing_upload.as_deref() == Some(key) {
                return Err(Error::Storage("connection reset".into()));
            }
            self.inner.upload(bucket, key, local_path).await
        }

        async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
            self.inner.download(bucket, key, local_path).await
        }

        async fn list_page(
            &self,
            bucket: &str,
            prefix: &str,
            continuation: Option<String>,
        ) -> Result<ListPage> {
            self.inner.list_page(bucket, prefix, continuation).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// `//` を含む別名のキーでも同じオブジェクトを返すストア
    ///
    /// ダウンロードは書き込み後に一度ほかのタスクへ譲るので、同じパスへの
    /// 転送が必ず重なる。
    struct AliasStore {
        inner: LocalStore,
        keys: Vec<String>,
    }

    #[async_trait]
    impl ObjectStore for AliasStore {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            self.inner.bucket_exists(bucket).await
        }

        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.inner.create_bucket(bucket).await
        }

        async fn stat(&self, bucket: &str, key: &str) -> Result<Option<ObjectMeta>> {
            self.inner.stat(bucket, &key.replace("//", "/")).await
        }

        async fn upload(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
            self.inner.upload(bucket, &key.replace("//", "/"), local_path).await
        }

        async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
            self.inner
                .download(bucket, &key.replace("//", "/"), local_path)
                .await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }

        async fn list_page(
            &self,
            _bucket: &str,
            _prefix: &str,
            _continuation: Option<String>,
        ) -> Result<ListPage> {
            Ok(ListPage {
                objects: self
                    .keys
                    .iter()
                    .map(|key| ObjectSummary {
                        key: key.clone(),
                        size: 3,
                    })
                    .collect(),
                continuation: None,
            })
        }

        fn name(&self) -> &str {
            "alias"
        }
    }

    fn write_file(path: &Path, size: usize) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, vec![b'k'; size])?;
        Ok(())
    }

    async fn backup(
        store: &dyn ObjectStore,
        source: &Path,
        options: SyncOptions,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SyncReport> {
        SyncPlan::backup(store, source, BucketLocation::new("bucket", "backup"), options)
            .await?
            .run(observer)
            .await
    }

    #[tokio::test]
    async fn test_backup_then_incremental_backup() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        write_file(&source.join("small.txt"), 500)?;
        write_file(&source.join("large.bin"), 2000)?;
        fs::create_dir_all(source.join("empty"))?;

        let store = LocalStore::new(temp.path().join("store"));
        let location = BucketLocation::new("bucket", "backup");

        let plan =
            SyncPlan::backup(&store, &source, location.clone(), SyncOptions::default()).await?;
        assert_eq!(
            *plan.summary(),
            DirectorySummary {
                directory_count: 1,
                file_count: 2,
                total_size: 2500,
            }
        );
        assert_eq!(format_size(plan.summary().total_size), "2.44 KB");

        let mut console = ConsoleProgress::new(ProgressStyle::default(), Vec::new(), Vec::new());
        let report = plan.run(&mut console).await?;

        assert_eq!(report.transferred, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.transferred_bytes, 2500);
        assert!(report.is_success());

        assert_eq!(console.state().completed_files, 2);
        assert_eq!(console.state().completed_bytes, 2500);
        let (out, err) = console.into_writers();
        let out = String::from_utf8(out).unwrap();
        let last_line = out.rsplit('\r').next().unwrap();
        assert!(last_line.starts_with("100% "));
        assert!(last_line.contains("2/2 files"));
        assert!(err.is_empty());

        assert!(store.stat("bucket", "backup/small.txt").await?.is_some());
        assert!(store.stat("bucket", "backup/large.bin").await?.is_some());

        // 2 回目はどちらも最新なのでスキップ
        let mut recorder = Recorder::default();
        let report = backup(&store, &source, SyncOptions::default(), &mut recorder).await?;
        assert_eq!(report.transferred, 0);
        assert_eq!(report.skipped, 2);
        assert!(recorder.completed.iter().all(|(_, label)| *label == "skipped"));

        Ok(())
    }

    #[tokio::test]
    async fn test_backup_uploads_files_modified_after_backup() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        write_file(&source.join("notes.txt"), 10)?;
        write_file(&source.join("photo.jpg"), 20)?;

        let store = LocalStore::new(temp.path().join("store"));
        backup(&store, &source, SyncOptions::default(), &mut SilentProgress).await?;

        let later = SystemTime::now() + Duration::from_secs(3600);
        filetime::set_file_mtime(
            source.join("notes.txt"),
            filetime::FileTime::from_system_time(later),
        )?;

        let mut recorder = Recorder::default();
        let report = backup(&store, &source, SyncOptions::default(), &mut recorder).await?;

        assert_eq!(report.transferred, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            recorder.completed,
            vec![
                ("notes.txt".to_string(), "transferred"),
                ("photo.jpg".to_string(), "skipped"),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_one_failed_upload_does_not_abort_the_run() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        write_file(&source.join("1.txt"), 100)?;
        write_file(&source.join("2.txt"), 200)?;
        write_file(&source.join("3.txt"), 300)?;

        let mut store = FlakyStore::new(&temp.path().join("store"));
        store.failing_upload = Some("backup/2.txt".to_string());

        let mut recorder = Recorder::default();
        let report = backup(&store, &source, SyncOptions::default(), &mut recorder).await?;

        assert_eq!(report.transferred, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed(), 3);
        assert!(!report.is_success());
        assert_eq!(
            recorder.completed,
            vec![
                ("1.txt".to_string(), "transferred"),
                ("2.txt".to_string(), "failed"),
                ("3.txt".to_string(), "transferred"),
            ]
        );
        assert_eq!(recorder.finished, Some(report));

        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_error_is_a_failure_not_a_transfer() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        write_file(&source.join("a.txt"), 1)?;

        let mut store = FlakyStore::new(&temp.path().join("store"));
        store.failing_stat = Some("backup/a.txt".to_string());

        let report = backup(&store, &source, SyncOptions::default(), &mut SilentProgress).await?;

        assert_eq!(report.failed, 1);
        assert_eq!(report.transferred, 0);
        assert!(store.inner.stat("bucket", "backup/a.txt").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_backup_counts_every_item_once() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        for i in 0..40 {
            write_file(&source.join(format!("dir{}/file{}.bin", i % 4, i)), i)?;
        }

        let store = LocalStore::new(temp.path().join("store"));
        let options = SyncOptions {
            jobs: 8,
            ..Default::default()
        };

        let mut console = ConsoleProgress::new(ProgressStyle::default(), Vec::new(), Vec::new());
        let report = backup(&store, &source, options, &mut console).await?;

        assert_eq!(report.transferred, 40);
        assert_eq!(console.state().completed_files, 40);
        assert_eq!(console.state().completed_bytes, (0..40).sum::<u64>());
        assert_eq!(console.state().total_bytes, (0..40).sum::<u64>());

        Ok(())
    }

    #[tokio::test]
    async fn test_backup_missing_source_is_fatal() -> Result<()> {
        let temp = TempDir::new()?;
        let store = LocalStore::new(temp.path().join("store"));

        let result = SyncPlan::backup(
            &store,
            temp.path().join("missing"),
            BucketLocation::new("bucket", "backup"),
            SyncOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_round_trip() -> Result<()> {
        let temp = TempDir::new()?;
        let source = temp.path().join("source");
        write_file(&source.join("a.txt"), 500)?;
        write_file(&source.join("nested/deep/b.txt"), 2000)?;

        let store = LocalStore::new(temp.path().join("store")).with_page_size(1);
        backup(&store, &source, SyncOptions::default(), &mut SilentProgress).await?;

        // プレフィックスが似ている別ディレクトリは復元対象外
        write_file(&temp.path().join("store/bucket/backup2/other.txt"), 9)?;

        let destination = temp.path().join("restore");
        fs::create_dir(&destination)?;

        let plan = SyncPlan::restore(
            &store,
            BucketLocation::new("bucket", "backup"),
            &destination,
            SyncOptions::default(),
        )
        .await?;
        assert_eq!(plan.summary().file_count, 2);
        assert_eq!(plan.summary().total_size, 2500);
        assert_eq!(plan.summary().directory_count, 2);

        let mut recorder = Recorder::default();
        let report = plan.run(&mut recorder).await?;

        assert_eq!(report.transferred, 2);
        assert_eq!(recorder.totals, Some(SyncTotals { files: 2, bytes: 2500 }));
        assert_eq!(fs::read(destination.join("a.txt"))?.len(), 500);
        assert_eq!(fs::read(destination.join("nested/deep/b.txt"))?.len(), 2000);
        assert!(!destination.join("other.txt").exists());

        // 復元は無条件に行う
        let report = SyncPlan::restore(
            &store,
            BucketLocation::new("bucket", "backup"),
            &destination,
            SyncOptions::default(),
        )
        .await?
        .run(&mut SilentProgress)
        .await?;
        assert_eq!(report.transferred, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_restore_requires_existing_bucket() -> Result<()> {
        let temp = TempDir::new()?;
        let store = LocalStore::new(temp.path().join("store"));

        let result = SyncPlan::restore(
            &store,
            BucketLocation::new("missing", "backup"),
            temp.path(),
            SyncOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(Error::BucketUnavailable(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_rejects_keys_escaping_destination() -> Result<()> {
        let temp = TempDir::new()?;
        let store = LocalStore::new(temp.path().join("store"));
        store.create_bucket("bucket").await?;

        let destination = temp.path().join("restore");
        fs::create_dir(&destination)?;

        let escaping = ObjectSummary {
            key: "backup/../evil.txt".to_string(),
            size: 1,
        };
        let (item, outcome) =
            restore_item(&store, "bucket", "backup/", &destination, escaping).await;

        assert!(matches!(outcome, TransferOutcome::Failed(Error::InvalidPath(_))));
        assert_eq!(item.relative_path, "../evil.txt");
        assert!(!temp.path().join("evil.txt").exists());

        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_restore_of_keys_sharing_a_path() -> Result<()> {
        let temp = TempDir::new()?;
        let inner = LocalStore::new(temp.path().join("store"));
        inner.create_bucket("bucket").await?;
        let source = temp.path().join("a.txt");
        fs::write(&source, b"abc")?;
        inner.upload("bucket", "backup/a.txt", &source).await?;

        let store = AliasStore {
            inner,
            keys: vec!["backup/a.txt".to_string(), "backup//a.txt".to_string()],
        };

        let destination = temp.path().join("restore");
        fs::create_dir(&destination)?;
        let options = SyncOptions {
            jobs: 2,
            ..Default::default()
        };

        let report = SyncPlan::restore(
            &store,
            BucketLocation::new("bucket", "backup"),
            &destination,
            options,
        )
        .await?
        .run(&mut SilentProgress)
        .await?;

        assert_eq!(report.transferred, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read(destination.join("a.txt"))?, b"abc");
        assert!(transfer::partial_files(&destination)?.is_empty());

        Ok(())
    }
}
