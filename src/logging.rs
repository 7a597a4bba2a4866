//! Logging setup.
//!
//! `RUST_LOG`, when set, takes precedence over the configured level.

use crate::config::{LogFormat, LogSettings};
use crate::error::{Error, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Map a level name to a filter. `critical` has no tracing counterpart and
/// shows errors only.
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "critical" | "error" => Ok(LevelFilter::ERROR),
        "warning" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        other => Err(Error::Settings(config::ConfigError::Message(format!(
            "unknown log level '{other}'"
        )))),
    }
}

/// Install the global subscriber. Keep the returned guard alive for as long
/// as logs should reach the log file.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let level = parse_log_level(&settings.level)?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let (file_writer, guard) = match &settings.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let prefix = path
                .file_name()
                .ok_or_else(|| {
                    Error::Settings(config::ConfigError::Message(format!(
                        "log file '{}' has no file name",
                        path.display()
                    )))
                })?;
            let appender = tracing_appender::rolling::daily(directory, prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    // Escape codes would end up in the log file, so it gets its own layer.
    let registry = tracing_subscriber::registry().with(filter);
    match settings.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(file_writer.map(|w| fmt::layer().with_ansi(false).with_writer(w)))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(file_writer.map(|w| fmt::layer().json().with_writer(w)))
            .init(),
    }

    Ok(guard)
}
