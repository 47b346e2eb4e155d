//! Tracing subscriber setup.
//!
//! Events go to stderr in the configured format. When a log directory is
//! configured they are also written as JSON lines to a daily rolling file
//! `solo.log.YYYY-MM-DD` in that directory.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogFormat;

const LOG_FILE_PREFIX: &str = "solo.log";

/// Pick the filter directive: `RUST_LOG` wins over the configured level.
fn filter_from(rust_log: Option<String>, level: &str) -> Result<EnvFilter> {
    match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(directive) => {
            EnvFilter::try_new(&directive).with_context(|| format!("Invalid RUST_LOG '{}'", directive))
        }
        None => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level)),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(level: &str, format: LogFormat, dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = filter_from(std::env::var("RUST_LOG").ok(), level)?;

    let stderr_layer = match format {
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let (file_layer, guard) = match dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
