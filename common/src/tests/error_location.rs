use crate::ErrorLocation;

use std::panic::Location;

#[track_caller]
fn raise_here() -> ErrorLocation {
    ErrorLocation::here()
}

/// **VALUE**: Verifies that `ErrorLocation::here()` reports the caller, not itself.
///
/// **WHY THIS MATTERS**: Every error enum in the workspace stamps its variants with a
/// location. If `here()` lost `#[track_caller]`, every error would point into `common`.
///
/// **BUG THIS CATCHES**: Would catch removal of `#[track_caller]` on `here()` or on the
/// helpers that forward to it.
#[test]
fn given_track_caller_chain_when_here_called_then_points_at_outer_call_site() {
    // GIVEN: The line of the call below
    let expected_line = line!() + 3;

    // WHEN: Capturing through a track_caller helper
    let location = raise_here();

    // THEN: Should report this file and the call line
    assert!(location.file.contains("error_location.rs"));
    assert_eq!(location.line, expected_line);
    assert!(location.column > 0, "Should capture column number");
}

/// **VALUE**: Verifies the `[file:line:column]` rendering used in every error message.
///
/// **BUG THIS CATCHES**: Would catch a Display change that strips the brackets or one of
/// the three components.
#[test]
fn given_error_location_when_formatted_then_produces_bracketed_format() {
    // GIVEN: A location
    let location = ErrorLocation::from(Location::caller());

    // WHEN: Formatting
    let formatted = location.to_string();

    // THEN: Bracketed with two separators
    assert!(formatted.starts_with('['), "Should start with [");
    assert!(formatted.ends_with(']'), "Should end with ]");
    assert_eq!(formatted.matches(':').count(), 2, "file:line:column");
}
