use std::env;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/panel-backup.log";

/// Stdout plus a plain-text log file. Keep the returned guard alive for the
/// whole run or buffered file output is lost.
pub fn init_logger() -> impl Drop {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_file_path = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never("./", &log_file_path));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(EnvFilter::new(filter))
        .init();

    info!("Logging to stdout and {}", log_file_path);

    guard
}
