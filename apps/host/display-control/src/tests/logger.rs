// Unit tests for logger initialization
// Focus on repeated calls and unusable log directories

use crate::error::DisplayControlError;
use crate::logger::{initialize, initialize_internal};

use std::path::PathBuf;

/// **VALUE**: Verifies that calling initialize() twice neither panics nor fails.
///
/// **WHY THIS MATTERS**: Startup paths and tests may both initialize logging.
/// A second call must not bring the process down.
///
/// **BUG THIS CATCHES**: Would catch removal of the Once/AtomicBool guards,
/// which makes fern fail when a global logger is set twice.
#[test]
fn given_logger_initialized_when_called_again_then_returns_ok() {
    // GIVEN: A writable temporary directory
    let temp_dir = tempfile::tempdir().unwrap();

    // WHEN: Calling initialize twice
    let first = initialize(temp_dir.path());
    let second = initialize(temp_dir.path());

    // THEN: Both return Ok
    assert!(first.is_ok(), "First initialization should succeed");
    assert!(second.is_ok(), "Second initialization should be a no-op");
}

/// **VALUE**: Verifies an unusable log directory is reported, not panicked on.
///
/// **WHY THIS MATTERS**: A missing or read-only data directory must produce a
/// readable startup error.
///
/// **BUG THIS CATCHES**: Would catch an unwrap on `fern::log_file()`.
///
/// Calls the unguarded setup directly: the public entry point returns Ok once
/// any test in this process has installed the logger. The log file is opened
/// before the global logger is touched, so this never installs one.
#[test]
fn given_invalid_log_dir_when_logger_set_up_then_returns_app_error() {
    // GIVEN: A path below a character device, which cannot hold files
    let invalid_dir = PathBuf::from("/dev/null/invalid-path");

    // WHEN: Setting the logger up there
    let result = initialize_internal(&invalid_dir);

    // THEN: The log file failure surfaces as an App error
    match result {
        Err(DisplayControlError::App { message, .. }) => {
            assert!(message.contains("log file"), "unexpected message: {message}");
        }
        other => panic!("expected an App error, got {other:?}"),
    }
}
