use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use scopeguard::ScopeGuard;

use crate::storage::ObjectStore;
use crate::sync::{SyncItem, TransferOutcome};
use crate::Result;

const PARTIAL_SUFFIX: &str = ".kura-part";

/// 一時ファイル名の通し番号
static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// 1 ファイルをアップロード
///
/// 失敗はこのアイテムの中で `Failed` に変換し、呼び出し元には伝播させない。
/// 利用者への報告は observer が行う。
pub async fn upload(store: &dyn ObjectStore, bucket: &str, item: &SyncItem) -> TransferOutcome {
    match store.upload(bucket, &item.key, &item.local_path).await {
        Ok(()) => {
            tracing::debug!(path = %item.relative_path, key = %item.key, "uploaded");
            TransferOutcome::Transferred
        }
        Err(e) => {
            tracing::debug!(path = %item.relative_path, key = %item.key, error = %e, "upload failed");
            TransferOutcome::Failed(e)
        }
    }
}

/// 1 オブジェクトをダウンロード
///
/// 親ディレクトリを作成し、一時ファイルに書き込んでから置き換える。
/// 失敗やキャンセル時に途中までのファイルは残らない。一時ファイルは転送ごとに
/// 別の名前になるので、同じパスに解決される別々のキーが並行して書き込んでも
/// 衝突しない（最後に置き換えたものが残る）。
pub async fn download(store: &dyn ObjectStore, bucket: &str, item: &SyncItem) -> TransferOutcome {
    match download_to(store, bucket, &item.key, &item.local_path).await {
        Ok(()) => {
            tracing::debug!(key = %item.key, path = %item.local_path.display(), "downloaded");
            TransferOutcome::Transferred
        }
        Err(e) => {
            tracing::debug!(key = %item.key, path = %item.local_path.display(), error = %e, "download failed");
            TransferOutcome::Failed(e)
        }
    }
}

async fn download_to(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    local_path: &Path,
) -> Result<()> {
    if let Some(parent) = local_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(local_path);
    // future が途中で破棄された場合もここで後始末される
    let guard = scopeguard::guard(partial.clone(), |path| {
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove partial file");
            }
        }
    });

    store.download(bucket, key, &partial).await?;
    tokio::fs::rename(&partial, local_path).await?;

    ScopeGuard::into_inner(guard);
    Ok(())
}

/// `<name>.<pid>.<seq>.kura-part`
fn partial_path(path: &Path) -> PathBuf {
    let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name: OsString = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.{}{}", std::process::id(), seq, PARTIAL_SUFFIX));
    path.with_file_name(name)
}

/// `dir` 以下に残っている一時ファイル
#[cfg(test)]
pub(crate) fn partial_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(PARTIAL_SUFFIX) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}
