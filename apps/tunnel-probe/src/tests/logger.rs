// Unit tests for logger module initialization logic
// Tests focus on idempotence and file output

use crate::logger::{LOG_FILE_NAME, initialize};

use log::LevelFilter;
use tempfile::TempDir;

/// **VALUE**: Verifies that calling initialize() multiple times doesn't panic or fail.
///
/// **WHY THIS MATTERS**: Tests and the binary may both initialize logging. If
/// the second call errors, the probe would exit before doing any work.
///
/// **BUG THIS CATCHES**: Would catch if the Once or AtomicBool guards are removed,
/// causing fern to fail when trying to set a global logger twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A temporary log directory that does not exist yet
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("logs");

    // WHEN: Calling initialize twice
    let result1 = initialize(Some(&log_dir), LevelFilter::Debug);
    let result2 = initialize(Some(&log_dir), LevelFilter::Debug);

    // THEN: Both return Ok
    assert!(result1.is_ok(), "First initialization should succeed");
    assert!(
        result2.is_ok(),
        "Second initialization should succeed (idempotent)"
    );

    // AND: The directory and log file were created by the first call
    assert!(log_dir.join(LOG_FILE_NAME).exists());
}
