use std::io::{self, Write};

use crate::sync::{SyncItem, SyncReport, TransferOutcome};
use crate::tree::DirectorySummary;
use crate::utils::{format_size_with, SIZES_ALIGNED_ABBRV};

/// プログレスバーの見た目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStyle {
    /// バーの幅（文字数）
    pub width: usize,
    /// 完了部分の文字
    pub complete: char,
    /// 未完了部分の文字
    pub incomplete: char,
}

impl Default for ProgressStyle {
    fn default() -> Self {
        Self {
            width: 20,
            complete: '#',
            incomplete: '.',
        }
    }
}

impl ProgressStyle {
    /// 進捗率（0.0 - 1.0）からバーを生成
    ///
    /// 完了セル数は四捨五入（0.5 は切り上げ）で決める。
    pub fn bar(&self, fraction: f64) -> String {
        let fraction = fraction.clamp(0.0, 1.0);
        let filled = round_half_up(fraction * self.width as f64).min(self.width);

        let mut bar = String::with_capacity(self.width);
        bar.extend(std::iter::repeat(self.complete).take(filled));
        bar.extend(std::iter::repeat(self.incomplete).take(self.width - filled));
        bar
    }
}

fn round_half_up(value: f64) -> usize {
    (value + 0.5).floor() as usize
}

/// 1 回の同期の進捗
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub completed_files: u64,
    pub total_files: u64,
    pub completed_bytes: u64,
    pub total_bytes: u64,
}

impl ProgressState {
    pub fn new(total_files: u64, total_bytes: u64) -> Self {
        Self {
            total_files,
            total_bytes,
            ..Default::default()
        }
    }

    /// 1 ファイル分の完了を記録
    pub fn complete_file(&mut self, size: u64) {
        self.completed_files += 1;
        self.completed_bytes += size;
    }

    /// バイト数ベースの進捗率（合計 0 バイトなら 1.0）
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            (self.completed_bytes as f64 / self.total_bytes as f64).min(1.0)
        }
    }

    /// 進捗を 1 行の文字列にする
    ///
    /// 例: ` 50% |##########..........|  1.22 KB/2.44 KB    1/2 files`
    pub fn render(&self, style: &ProgressStyle) -> String {
        let fraction = self.fraction();
        let percentage = format!("{:>3}%", (fraction * 100.0).round() as u64);
        let bar = style.bar(fraction);

        let done_size = format_size_with(self.completed_bytes, SIZES_ALIGNED_ABBRV, 1024);
        let total_size = format_size_with(self.total_bytes, SIZES_ALIGNED_ABBRV, 1024);
        // 0 から合計までのどの値でも桁がずれないよう、最も長くなりうる表示に合わせる
        let widest = format_size_with(1000, SIZES_ALIGNED_ABBRV, 1024);
        let size_width = total_size.len().max(widest.len());

        let files_width = self.total_files.to_string().len();

        format!(
            "{} |{}|  {:>size_width$}/{}    {:>files_width$}/{} files",
            percentage,
            bar,
            done_size,
            total_size,
            self.completed_files,
            self.total_files,
            size_width = size_width,
            files_width = files_width,
        )
    }
}

/// 同期の開始時に渡される合計値
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub files: u64,
    pub bytes: u64,
}

impl From<&DirectorySummary> for SyncTotals {
    fn from(summary: &DirectorySummary) -> Self {
        Self {
            files: summary.file_count,
            bytes: summary.total_size,
        }
    }
}

/// 進捗の通知先
///
/// `on_item_completed` は 1 アイテムにつき 1 回、転送が終わった後に
/// 呼ばれる。同時に複数回呼ばれることはない。
pub trait ProgressObserver {
    fn on_started(&mut self, _totals: &SyncTotals) {}

    fn on_item_completed(&mut self, item: &SyncItem, outcome: &TransferOutcome);

    fn on_finished(&mut self, _report: &SyncReport) {}
}

/// 何も表示しない
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_item_completed(&mut self, _item: &SyncItem, _outcome: &TransferOutcome) {}
}

/// tracing にイベントとして記録する
#[derive(Debug, Default)]
pub struct LogProgress {
    state: ProgressState,
}

impl LogProgress {
    pub fn state(&self) -> &ProgressState {
        &self.state
    }
}

impl ProgressObserver for LogProgress {
    fn on_started(&mut self, totals: &SyncTotals) {
        self.state = ProgressState::new(totals.files, totals.bytes);
        tracing::info!(files = totals.files, bytes = totals.bytes, "sync started");
    }

    fn on_item_completed(&mut self, item: &SyncItem, outcome: &TransferOutcome) {
        self.state.complete_file(item.size);
        match outcome {
            TransferOutcome::Failed(e) => tracing::warn!(
                path = %item.relative_path,
                key = %item.key,
                error = %e,
                "transfer failed"
            ),
            outcome => tracing::info!(
                path = %item.relative_path,
                outcome = outcome.label(),
                completed_files = self.state.completed_files,
                completed_bytes = self.state.completed_bytes,
                "item completed"
            ),
        }
    }

    fn on_finished(&mut self, report: &SyncReport) {
        tracing::info!(
            transferred = report.transferred,
            skipped = report.skipped,
            failed = report.failed,
            "sync finished"
        );
    }
}

/// 端末に進捗行を上書き表示する
///
/// 進捗は `out` に改行なしで書き、失敗は `err` に 1 行ずつ書く。
pub struct ConsoleProgress<W: Write, E: Write> {
    state: ProgressState,
    style: ProgressStyle,
    trailing_spaces: usize,
    out: W,
    err: E,
}

impl ConsoleProgress<io::Stdout, io::Stderr> {
    pub fn stdout(style: ProgressStyle) -> Self {
        Self::new(style, io::stdout(), io::stderr())
    }
}

impl<W: Write, E: Write> ConsoleProgress<W, E> {
    pub fn new(style: ProgressStyle, out: W, err: E) -> Self {
        Self {
            state: ProgressState::default(),
            style,
            trailing_spaces: 8,
            out,
            err,
        }
    }

    pub fn with_trailing_spaces(mut self, trailing_spaces: usize) -> Self {
        self.trailing_spaces = trailing_spaces;
        self
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn into_writers(self) -> (W, E) {
        (self.out, self.err)
    }

    fn print_line(&mut self) {
        let line = self.state.render(&self.style);
        let result = write!(
            self.out,
            "\r{}{}",
            line,
            " ".repeat(self.trailing_spaces)
        )
        .and_then(|_| self.out.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "failed to write progress line");
        }
    }
}

impl<W: Write, E: Write> ProgressObserver for ConsoleProgress<W, E> {
    fn on_started(&mut self, totals: &SyncTotals) {
        self.state = ProgressState::new(totals.files, totals.bytes);
        self.print_line();
    }

    fn on_item_completed(&mut self, item: &SyncItem, outcome: &TransferOutcome) {
        if let TransferOutcome::Failed(e) = outcome {
            // 進捗行の途中に混ざらないよう改行してから書く
            let _ = writeln!(self.err, "\nfailed: {}: {}", item.relative_path, e);
        }
        self.state.complete_file(item.size);
        self.print_line();
    }

    fn on_finished(&mut self, _report: &SyncReport) {
        let _ = writeln!(self.out);
        let _ = self.out.flush();
    }
}
