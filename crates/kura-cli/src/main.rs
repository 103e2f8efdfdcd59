mod logging;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle as SpinnerStyle};
use kura_core::config::Config;
use kura_core::utils::{format_bytes_exact, format_size};
use kura_core::{
    BucketLocation, ConsoleProgress, LogProgress, ProgressObserver, SilentProgress, SyncOptions,
    SyncPlan, SyncReport,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// 一部のファイルの転送に失敗したときの終了コード（2 は clap の引数エラー）
const EXIT_ITEM_FAILURES: u8 = 3;
/// Ctrl-C で中断したときの終了コード
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "kura")]
#[command(author, version, about = "バケットへの増分バックアップ・復元ツール", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// ログを詳しく表示（-v: info, -vv: debug, -vvv: trace）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// ディレクトリをバケットにバックアップ（新しいファイルのみ転送）
    Backup {
        /// バックアップするディレクトリ
        #[arg(value_name = "DIRECTORY", value_parser = existing_directory)]
        source: PathBuf,

        /// バックアップ先
        #[arg(value_name = "BUCKET::DIRECTORY")]
        destination: BucketLocation,

        /// シンボリックリンクをたどる
        #[arg(long)]
        follow_symlinks: bool,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// バケットからディレクトリに復元
    Restore {
        /// 復元元
        #[arg(value_name = "BUCKET::DIRECTORY")]
        source: BucketLocation,

        /// 復元先のディレクトリ
        #[arg(value_name = "DIRECTORY", value_parser = existing_directory)]
        destination: PathBuf,

        #[command(flatten)]
        sync: SyncArgs,
    },

    /// 設定ファイルの操作
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// シェル補完スクリプトを出力
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 現在の設定を表示
    Show,

    /// 設定ファイルのひな形を作成
    Init {
        /// 既存の設定ファイルを上書き
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// 同時に転送するファイル数（デフォルト: 設定ファイルの値、なければ 1）
    #[arg(short, long)]
    jobs: Option<usize>,

    /// ストレージバックエンド ("s3" or "local")
    #[arg(short, long)]
    backend: Option<String>,

    /// 進捗の表示方法
    #[arg(long, value_enum, default_value_t = ProgressMode::Console)]
    progress: ProgressMode,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProgressMode {
    /// 1 行を上書きして表示
    Console,
    /// ログとして出力
    Log,
    /// 表示しない
    None,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_progress = match &cli.command {
        Commands::Backup { sync, .. } | Commands::Restore { sync, .. } => {
            sync.progress == ProgressMode::Log
        }
        _ => false,
    };
    logging::init(cli.verbose, log_progress);

    match cli.command {
        Commands::Backup {
            source,
            destination,
            follow_symlinks,
            sync,
        } => backup(source, destination, follow_symlinks, sync).await,
        Commands::Restore {
            source,
            destination,
            sync,
        } => restore(source, destination, sync).await,
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => show_config()?,
                ConfigAction::Init { force } => init_config(force)?,
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "kura", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn existing_directory(raw: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("no such directory: {}", raw))
    }
}

async fn backup(
    source: PathBuf,
    destination: BucketLocation,
    follow_symlinks: bool,
    args: SyncArgs,
) -> Result<ExitCode> {
    let config = Config::load()?;
    let mut options = sync_options(&config, &args);
    options.follow_symlinks |= follow_symlinks;

    let backend = args
        .backend
        .clone()
        .unwrap_or_else(|| config.get_storage_backend());
    let store = config.create_store(&backend).await?;
    tracing::debug!(
        backend = store.name(),
        jobs = options.jobs,
        follow_symlinks = options.follow_symlinks,
        "starting backup"
    );

    println!(
        "{}",
        format!("☁️  {} を {} にバックアップします", source.display(), destination)
            .cyan()
            .bold()
    );

    let spinner = spinner("ディレクトリのサイズを計算中...");
    let plan = SyncPlan::backup(store.as_ref(), &source, destination.clone(), options).await;
    spinner.finish_and_clear();
    let plan = plan.with_context(|| format!("{} のバックアップを開始できません", destination))?;

    let summary = *plan.summary();
    let exact = if summary.total_size >= 1024 {
        format!(" ({})", format_bytes_exact(summary.total_size))
    } else {
        String::new()
    };
    println!(
        "{} {} ディレクトリ, {} ファイル, {}{}",
        "📁".cyan(),
        summary.directory_count.to_string().yellow().bold(),
        summary.file_count.to_string().yellow().bold(),
        format_size(summary.total_size).yellow().bold(),
        exact.dimmed()
    );

    let report = run(plan, &config, args.progress).await?;
    Ok(finish("バックアップ", report))
}

async fn restore(source: BucketLocation, destination: PathBuf, args: SyncArgs) -> Result<ExitCode> {
    let config = Config::load()?;
    let options = sync_options(&config, &args);

    let backend = args
        .backend
        .clone()
        .unwrap_or_else(|| config.get_storage_backend());
    let store = config.create_store(&backend).await?;
    tracing::debug!(backend = store.name(), jobs = options.jobs, "starting restore");

    println!(
        "{}",
        format!("📥 {} を {} に復元します", source, destination.display())
            .cyan()
            .bold()
    );

    let spinner = spinner("バケット内ディレクトリのサイズを計算中...");
    let plan = SyncPlan::restore(store.as_ref(), source.clone(), &destination, options).await;
    spinner.finish_and_clear();
    let plan = plan.with_context(|| format!("{} の復元を開始できません", source))?;

    let summary = *plan.summary();
    println!(
        "{} {} 件のファイルを復元します ({})",
        "📁".cyan(),
        summary.file_count.to_string().yellow().bold(),
        format_size(summary.total_size).yellow().bold()
    );

    let report = run(plan, &config, args.progress).await?;
    Ok(finish("復元", report))
}

fn sync_options(config: &Config, args: &SyncArgs) -> SyncOptions {
    let mut options = config.sync_options();
    if let Some(jobs) = args.jobs {
        options.jobs = jobs.max(1);
    }
    options
}

/// 転送を実行（Ctrl-C で中断された場合は None）
async fn run(plan: SyncPlan<'_>, config: &Config, mode: ProgressMode) -> Result<Option<SyncReport>> {
    let mut observer: Box<dyn ProgressObserver> = match mode {
        ProgressMode::Console => Box::new(ConsoleProgress::stdout(config.progress_style()?)),
        ProgressMode::Log => Box::new(LogProgress::default()),
        ProgressMode::None => Box::new(SilentProgress),
    };

    // run を破棄すると、ダウンロード途中のファイルは削除される
    tokio::select! {
        report = plan.run(observer.as_mut()) => Ok(Some(report?)),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n{}", "中断しました".yellow());
            Ok(None)
        }
    }
}

/// 実行結果を終了コードに変換
fn exit_status(report: Option<&SyncReport>) -> u8 {
    match report {
        None => EXIT_INTERRUPTED,
        Some(report) if report.is_success() => 0,
        Some(_) => EXIT_ITEM_FAILURES,
    }
}

fn finish(label: &str, report: Option<SyncReport>) -> ExitCode {
    let code = ExitCode::from(exit_status(report.as_ref()));
    let Some(report) = report else {
        return code;
    };

    let icon = if report.is_success() {
        "✅".green()
    } else {
        "⚠".yellow()
    };

    println!(
        "\n{} {}完了: {} 件転送 ({}), {} 件スキップ, {} 件失敗",
        icon,
        label,
        report.transferred.to_string().green().bold(),
        format_size(report.transferred_bytes),
        report.skipped.to_string().dimmed(),
        if report.failed > 0 {
            report.failed.to_string().red().bold()
        } else {
            report.failed.to_string().normal()
        }
    );

    code
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        SpinnerStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));
    spinner
}

fn show_config() -> Result<()> {
    let path = Config::config_path()?;
    let config = Config::load()?;

    println!("{} {}", "⚙".cyan(), path.display().to_string().bright_blue());
    if !path.exists() {
        println!(
            "{}",
            "設定ファイルがありません（デフォルト設定を使用）".dimmed()
        );
    }
    println!("\n{}", config.to_toml()?);
    println!(
        "{} {}",
        "💡".cyan(),
        format!("バックエンド: {}", config.get_storage_backend()).dimmed()
    );

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Config::config_path()?;
    if path.exists() && !force {
        println!(
            "{} {}",
            "ℹ".cyan(),
            format!("{} は既に存在します", path.display()).dimmed()
        );
        println!(
            "{} {}",
            "💡".cyan(),
            "上書きするには --force (-f) を指定してください".dimmed()
        );
        return Ok(());
    }

    Config::example().save_to(&path)?;
    println!("{} {} を作成しました", "✅".green(), path.display());
    Ok(())
}
