//! Subscriber setup for the binary.

use std::path::Path;

use anyhow::{anyhow, Result};
use fluffer_domain::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Stdout always gets a formatter (JSON when `logging.json` is set). When
/// `logging.file` is set, a second non-blocking JSON layer appends to that
/// file; the returned guard flushes it and must live until shutdown.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stdout = if config.json { fmt::layer().json().boxed() } else { fmt::layer().boxed() };

    let (file_layer, guard) = match config.file.as_deref() {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(filter).with(stdout).with(file_layer).try_init()?;
    Ok(guard)
}

fn file_appender(path: &str) -> Result<RollingFileAppender> {
    let path = Path::new(path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("logging.file has no file name: {path:?}"))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?)
}
