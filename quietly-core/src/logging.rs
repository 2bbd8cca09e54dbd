//! Logging for the `quietly` binary
//!
//! Log files live in `$XDG_STATE_HOME/quietly/`. With the default daily
//! rotation each UTC day gets its own `quietly.YYYY-MM-DD.log`; with
//! `rotation = "never"` everything goes to `quietly.log`. `RUST_LOG` overrides
//! the configured level.
//!
//! Only the binary, the store and the snapshot sink emit events. The engine
//! modules stay silent.

use crate::config::{Config, LogRotation, LoggingConfig};
use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const FILE_PREFIX: &str = "quietly";
const FILE_SUFFIX: &str = "log";

/// Keeps the background log writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Name of the file the appender writes to on `date` (UTC).
pub fn log_file_name(rotation: LogRotation, date: NaiveDate) -> String {
    match rotation {
        LogRotation::Daily => format!(
            "{}.{}.{}",
            FILE_PREFIX,
            date.format("%Y-%m-%d"),
            FILE_SUFFIX
        ),
        LogRotation::Never => format!("{}.{}", FILE_PREFIX, FILE_SUFFIX),
    }
}

/// The file currently receiving log lines.
pub fn current_log_file(config: &LoggingConfig) -> PathBuf {
    Config::state_dir().join(log_file_name(config.rotation, Utc::now().date_naive()))
}

fn file_appender(config: &LoggingConfig, dir: &Path) -> Result<RollingFileAppender> {
    let rotation = match config.rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix(FILE_SUFFIX)
        .max_log_files(config.max_files)
        .build(dir)
        .map_err(|e| Error::Config(format!("cannot open log file in {}: {}", dir.display(), e)))
}

/// Install the global subscriber writing to the state directory.
///
/// Hold the returned guard until the process exits.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let dir = Config::state_dir();
    std::fs::create_dir_all(&dir)?;

    let (writer, worker) = tracing_appender::non_blocking(file_appender(config, &dir)?);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    // Keep an already installed subscriber if there is one.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();

    tracing::info!(
        file = %current_log_file(config).display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _worker: worker })
}

/// Route events to the test harness output. Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
