use std::collections::HashSet;

use futures::stream::{self, Stream, TryStreamExt};

use crate::location::relative_key;
use crate::storage::{ObjectStore, ObjectSummary};
use crate::tree::DirectorySummary;
use crate::Result;

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// `prefix` 以下のオブジェクトをページ単位で遅延取得するストリーム
///
/// 次のページは前のページを消費し終えてから取得する。`/` で終わる
/// フォルダマーカーは除外する。並び順はバックエンドに従う。
pub fn list_objects<'a>(
    store: &'a dyn ObjectStore,
    bucket: &'a str,
    prefix: &'a str,
) -> impl Stream<Item = Result<ObjectSummary>> + Send + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let continuation = match cursor {
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
            Cursor::Done => return Ok::<_, crate::Error>(None),
        };

        let page = store.list_page(bucket, prefix, continuation).await?;
        tracing::trace!(bucket, prefix, count = page.objects.len(), "fetched listing page");

        let next = match page.continuation {
            Some(token) => Cursor::Next(token),
            None => Cursor::Done,
        };
        let objects = page
            .objects
            .into_iter()
            .filter(|object| !object.key.ends_with('/'))
            .map(Ok);

        Ok(Some((stream::iter(objects), next)))
    })
    .try_flatten()
}

/// バケット内ディレクトリを集計
pub async fn summarize_remote(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<DirectorySummary> {
    let mut summary = DirectorySummary::default();
    let mut directories = HashSet::new();

    let mut objects = Box::pin(list_objects(store, bucket, prefix));
    while let Some(object) = objects.try_next().await? {
        let Some(relative) = relative_key(prefix, &object.key) else {
            continue;
        };

        summary.file_count += 1;
        summary.total_size += object.size;

        let mut parent = relative;
        while let Some((dir, _)) = parent.rsplit_once('/') {
            if !directories.insert(dir.to_string()) {
                break;
            }
            parent = dir;
        }
    }

    summary.directory_count = directories.len() as u64;
    Ok(summary)
}
