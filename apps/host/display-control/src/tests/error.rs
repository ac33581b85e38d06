// Unit tests for the host error type

use crate::error::DisplayControlError;

use common::ErrorLocation;

use control_core::error::CoreError;
use control_core::error::supervisor::SupervisorError;

use std::panic::Location;

/// **VALUE**: Console errors show the operator-facing message and where it came from.
///
/// **BUG THIS CATCHES**: Would catch a Display format that drops the message
/// or the `[file:line:col]` suffix.
#[test]
fn given_console_error_when_displayed_then_contains_message_and_location() {
    // GIVEN: A console error
    let err = DisplayControlError::Console {
        message: "unknown command `frob`".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN: Formatting it
    let text = err.to_string();

    // THEN: Message and location are both present
    assert!(text.contains("unknown command `frob`"));
    assert!(text.contains("error.rs:"), "location missing: {text}");
}

/// **VALUE**: Core errors convert with `?` and keep their own text.
///
/// **BUG THIS CATCHES**: Would catch losing `#[from]` or `#[error(transparent)]`
/// on the Core variant.
#[test]
fn given_core_error_when_converted_then_displays_transparently() {
    // GIVEN: A supervisor join failure lifted to CoreError
    let core: CoreError = SupervisorError::Join {
        message: "task panicked".to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
    .into();
    let expected = core.to_string();

    // WHEN: Converting into the host error
    let err: DisplayControlError = core.into();

    // THEN: Display is unchanged
    assert_eq!(err.to_string(), expected);
    assert!(matches!(err, DisplayControlError::Core(_)));
}
