//! Structured logging for worldreset using tracing.
//!
//! Logs to `<data dir>/logs/worldreset.{date}.log` with daily rotation,
//! keeping 7 days. Log level is controlled via `RUST_LOG`.
//!
//! Warnings and errors are mirrored to stderr so one-shot commands surface
//! them; `run` mirrors everything. Falls back to stderr only if the file
//! appender can't be created.

use fs_err as fs;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "worldreset=info,worldreset_core=info";

/// Installs the global subscriber. Keep the returned guard alive until exit
/// so buffered lines get flushed.
pub fn init(log_dir: &Path, mirror_all: bool) -> Option<WorkerGuard> {
    let _ = fs::create_dir_all(log_dir);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match create_file_appender(log_dir) {
        Ok(file_appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let stderr_level = if mirror_all {
                LevelFilter::TRACE
            } else {
                LevelFilter::WARN
            };

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(false),
                )
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(true)
                        .with_filter(stderr_level),
                )
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_timer(fmt::time::UtcTime::rfc_3339())
                        .with_ansi(true),
                )
                .init();
            None
        }
    }
}

fn create_file_appender(
    log_dir: &Path,
) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("worldreset")
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir)
}
