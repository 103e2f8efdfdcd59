use tracing_subscriber::EnvFilter;

/// ログ出力を初期化
///
/// 進捗行を stdout に書くため、ログは常に stderr に出す。
/// `RUST_LOG` が設定されていればそちらを優先する。
pub fn init(verbose: u8, log_progress: bool) {
    let level = match (verbose, log_progress) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,kura_core={0},kura_cli={0}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();
}
