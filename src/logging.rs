//! Logging setup: journald on Linux when available, otherwise a daily
//! rolling file under the local data directory.
//!
//! Nothing here writes to stdout or stderr; those belong to the CLI output.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `ALBUMSHELF_LOG=debug`
/// or `ALBUMSHELF_LOG=albumshelf::llm=debug,info`.
pub const LOG_ENV: &str = "ALBUMSHELF_LOG";

/// Default location for log files when journald is not used.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("albumshelf")
        .join("logs")
}

/// Initialize the logging system. Call once at startup.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer.with_syslog_identifier("albumshelf".to_string()))
                .init();

            tracing::debug!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "albumshelf.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes on drop, so it has to outlive main
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::debug!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}
