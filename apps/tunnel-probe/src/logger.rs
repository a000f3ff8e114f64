//! Logging for the tunnel probe.
//!
//! Colored stdout plus an optional plain-text log file, with thread-safe
//! initialization.

use crate::error::ProbeError;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::io::stdout;
use std::panic::Location;
use std::path::Path;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339;
use log::{LevelFilter, info, warn};

/// Thread-safe initialization guard.
static INIT_LOGGER_ONCE: Once = Once::new();

/// Tracks if logger initialization was already attempted.
static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

pub const LOG_FILE_NAME: &str = "tunnel-probe.log";

const LOGGER_INITIALIZED_MESSAGE_PREFIX: &str = "Logger initialized with level: ";

const LOGGER_ALREADY_INITIALIZED_MESSAGE: &str = "Logger already initialized";

/// Initialize the logger.
///
/// Safe to call more than once: later calls log a warning and return Ok.
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file (created if missing); stdout only when `None`
/// * `level` - Maximum level that is emitted
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created, or the
/// dispatch cannot be installed.
pub fn initialize(log_dir: Option<&Path>, level: LevelFilter) -> Result<(), ProbeError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        warn!("{LOGGER_ALREADY_INITIALIZED_MESSAGE}");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(log_dir, level);
        if result.is_ok() {
            info!("{LOGGER_INITIALIZED_MESSAGE_PREFIX}{level:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(log_dir: Option<&Path>, level: LevelFilter) -> Result<(), ProbeError> {
    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    let stdout_dispatch = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level}] {message} [{file}:{line}]",
                date = format_rfc3339(SystemTime::now()),
                level = color_configuration.color(record.level()),
                message = message,
                file = record.file().unwrap_or("unknown"),
                line = record.line().unwrap_or(0),
            ))
        })
        .chain(stdout());

    let mut dispatch = Dispatch::new().level(level).chain(stdout_dispatch);

    if let Some(log_dir) = log_dir {
        create_dir_all(log_dir).map_err(|e| ProbeError::Probe {
            message: format!("Failed to create log directory {}: {e}", log_dir.display()),
            location: ErrorLocation::from(Location::caller()),
        })?;

        // Plain text, no colors
        let file_dispatch = Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "[{date} - {level}] {message} [{file}:{line}]",
                    date = format_rfc3339(SystemTime::now()),
                    level = record.level(),
                    message = message,
                    file = record.file().unwrap_or("unknown"),
                    line = record.line().unwrap_or(0)
                ))
            })
            .chain(
                fern::log_file(log_dir.join(LOG_FILE_NAME)).map_err(|e| ProbeError::Probe {
                    message: format!("Failed to create log file: {e}"),
                    location: ErrorLocation::from(Location::caller()),
                })?,
            );

        dispatch = dispatch.chain(file_dispatch);
    }

    dispatch.apply().map_err(|e| ProbeError::Probe {
        message: format!("Failed to initialize logger: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    Ok(())
}
