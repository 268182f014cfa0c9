//! Structured Logger
//!
//! Console output plus a daily-rolling NDJSON file, with `RUST_LOG` taking
//! precedence over the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the background file writer alive; drop it only at shutdown.
pub struct LoggerGuard {
    _file: Option<WorkerGuard>,
}

/// Initialize the global structured logger.
///
/// With `log_dir = None` only the console layer is installed.
pub fn init_logger(log_dir: Option<&Path>, level: &str) -> Result<LoggerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            // Writes NDJSON to `<dir>/genforge.log.YYYY-MM-DD`.
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "genforge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // A subscriber may already be installed (tests, embedding hosts).
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggerGuard { _file: guard })
}
