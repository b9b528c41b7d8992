//! Logging setup driven by the `[logging]` config section.
//!
//! Records go to systemd's journal on Linux when it is enabled and
//! reachable, otherwise to a daily rolling file. `GEOSNAP_LOG` overrides the
//! configured level for a single run.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Environment variable holding a filter directive that beats the config.
pub const LOG_ENV: &str = "GEOSNAP_LOG";

/// Where log records ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackend {
    Journald,
    File(PathBuf),
}

/// Pick the filter: a directive from the environment wins over the configured level.
fn build_filter(env_directive: Option<&str>, level: &str) -> Result<EnvFilter> {
    let directive = env_directive.unwrap_or(level);
    EnvFilter::try_new(directive).with_context(|| format!("Invalid log filter '{}'", directive))
}

/// Install the global subscriber. Must be called at most once per process.
pub fn init(config: &LoggingConfig) -> Result<LogBackend> {
    let env_directive = std::env::var(LOG_ENV).ok();
    let env_filter = build_filter(env_directive.as_deref(), &config.level)?;

    #[cfg(target_os = "linux")]
    {
        if config.journald {
            if let Ok(journald_layer) = tracing_journald::layer() {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(journald_layer.with_syslog_identifier("geosnap".to_string()))
                    .init();

                tracing::info!("Logging initialized with journald backend");
                return Ok(LogBackend::Journald);
            }
        }
    }

    let log_dir = config.directory.clone().unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "geosnap.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer thread stops when the guard drops
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(LogBackend::File(log_dir))
}

pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geosnap")
        .join("logs")
}
