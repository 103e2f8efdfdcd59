use chrono::{DateTime, Utc};

use crate::storage::ObjectStore;
use crate::Result;

/// 転送が必要か判定
///
/// - リモートにオブジェクトがなければ転送する
/// - ローカルの更新日時が不明なら転送する
/// - それ以外はローカルがリモートより新しい場合のみ転送する（同時刻なら不要）
///
/// どちらも UTC の絶対時刻で比較する。
pub fn needs_transfer(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    match (local, remote) {
        (_, None) => true,
        (None, Some(_)) => true,
        (Some(local), Some(remote)) => local > remote,
    }
}

/// リモートのメタデータを取得して転送が必要か判定
///
/// オブジェクトが存在しない場合は `Ok(true)`。取得そのものの失敗は `Err` のまま返す。
pub async fn check(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    local_modified: Option<DateTime<Utc>>,
) -> Result<bool> {
    let remote = store.stat(bucket, key).await?;
    Ok(match remote {
        None => true,
        Some(meta) => needs_transfer(local_modified, meta.last_modified),
    })
}
