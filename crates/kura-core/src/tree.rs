use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::{Error, Result};

/// ディレクトリの集計結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectorySummary {
    /// サブディレクトリ数（ルート自身は含まない）
    pub directory_count: u64,
    /// ファイル数
    pub file_count: u64,
    /// 合計サイズ（バイト）
    pub total_size: u64,
}

/// 走査で見つかったローカルファイル
#[derive(Debug, Clone)]
pub struct LocalFile {
    /// ルートからの相対パス（区切りは常に `/`）
    pub relative_path: String,
    /// ファイルの絶対パス
    pub path: PathBuf,
    /// サイズ（バイト）
    pub size: u64,
    /// 最終更新日時
    pub modified: Option<DateTime<Utc>>,
}

enum Entry {
    Directory,
    File(LocalFile),
}

/// ディレクトリを再帰的に集計
pub fn summarize(root: &Path, follow_symlinks: bool) -> Result<DirectorySummary> {
    let mut summary = DirectorySummary::default();

    for entry in entries(root, follow_symlinks, true)? {
        match entry {
            Entry::Directory => summary.directory_count += 1,
            Entry::File(file) => {
                summary.file_count += 1;
                summary.total_size += file.size;
            }
        }
    }

    Ok(summary)
}

/// ディレクトリ配下のファイルを遅延評価で列挙
///
/// 返されるイテレータは一度しか走査できない。`summarize` と同じ規則で
/// エントリを選別するので、件数と合計サイズは常に一致する。読み飛ばした
/// エントリの警告は `summarize` だけが出し、ここでは debug に留める。
pub fn walk(root: &Path, follow_symlinks: bool) -> Result<impl Iterator<Item = LocalFile>> {
    Ok(entries(root, follow_symlinks, false)?.filter_map(|entry| match entry {
        Entry::File(file) => Some(file),
        Entry::Directory => None,
    }))
}

fn skipped(report: bool, path: Option<&Path>, error: &dyn fmt::Display) {
    let path = path.map(|p| p.display().to_string()).unwrap_or_default();
    if report {
        tracing::warn!(%path, %error, "skipping unreadable entry");
    } else {
        tracing::debug!(%path, %error, "skipping unreadable entry");
    }
}

fn entries(
    root: &Path,
    follow_symlinks: bool,
    report_skips: bool,
) -> Result<impl Iterator<Item = Entry>> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.to_path_buf()));
    }

    let root = root.to_path_buf();
    let walker = WalkDir::new(&root)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
        .min_depth(1);

    Ok(walker.into_iter().filter_map(move |entry| {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                skipped(report_skips, e.path(), &e);
                return None;
            }
        };

        // follow_links(false) のときシンボリックリンクはどちらにも該当しない
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return Some(Entry::Directory);
        }
        if !file_type.is_file() {
            return None;
        }

        let relative_path = match relative_path(&root, entry.path()) {
            Ok(path) => path,
            Err(e) => {
                skipped(report_skips, Some(entry.path()), &e);
                return None;
            }
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                skipped(report_skips, Some(entry.path()), &e);
                return None;
            }
        };

        Some(Entry::File(LocalFile {
            relative_path,
            path: entry.into_path(),
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }))
    }))
}

/// `root` から見た `path` の相対パスを `/` 区切りで返す
///
/// `path` が `root` 自身なら空文字列になる（`"."` ではない）。
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not inside {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name.to_str().ok_or_else(|| {
                    Error::InvalidPath(format!("non UTF-8 file name: {}", path.display()))
                })?;
                parts.push(name);
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidPath(format!(
                    "unexpected component in {}",
                    path.display()
                )))
            }
        }
    }

    Ok(parts.join("/"))
}
