// Unit tests for response frame parsing.

use crate::response::Response;

use common::StatusMessage;

use serde_json::json;

/// **VALUE**: Verifies a well-formed OK frame exposes header, status and result.
///
/// **BUG THIS CATCHES**: Would catch splitting on the wrong newline or losing the body.
#[test]
fn given_ok_frame_when_parsed_then_header_and_result_available() {
    // GIVEN: A LIST response frame
    let raw = "LIST\n{\"status_message\": \"OK\", \"result\": [\"chair\", \"lamp\"]}\n";

    // WHEN: Parsing
    let response = Response::parse(raw);

    // THEN: Header, status and result are exposed
    assert_eq!(response.header, "LIST");
    assert!(response.is_ok());
    assert_eq!(response.status(), StatusMessage::Ok);
    assert_eq!(response.result(), Some(&json!(["chair", "lamp"])));
    assert_eq!(response.error_message(), None);
}

/// **VALUE**: Verifies malformed peer output becomes an ERROR body instead of a panic.
///
/// **WHY THIS MATTERS**: The display is a separate program. A bug on its side must show up
/// as an error message in the UI, not crash the control application.
///
/// **BUG THIS CATCHES**: Would catch replacing the fallback with `?` or `unwrap()`.
#[test]
fn given_non_json_body_when_parsed_then_synthetic_error_body() {
    // GIVEN: A body that is not JSON
    let raw = "GET_MODEL\nthis is not json";

    // WHEN: Parsing
    let response = Response::parse(raw);

    // THEN: Header kept, status ERROR, decode error reported
    assert_eq!(response.header, "GET_MODEL");
    assert_eq!(response.status(), StatusMessage::Error);
    assert!(
        response.error_message().is_some_and(|m| !m.is_empty()),
        "decode error text should be reported"
    );
}

/// **VALUE**: Verifies a JSON body that is not an object is treated as malformed.
#[test]
fn given_array_body_when_parsed_then_synthetic_error_body() {
    let response = Response::parse("LIST\n[1, 2, 3]");

    assert!(!response.is_ok());
    assert!(response.error_message().is_some());
}

/// **VALUE**: Verifies a frame without a body line is reported, not accepted as OK.
#[test]
fn given_header_only_when_parsed_then_error() {
    let response = Response::parse("PING");

    assert_eq!(response.header, "PING");
    assert!(!response.is_ok());
}

/// **VALUE**: Verifies CRLF line endings from Windows peers are tolerated.
#[test]
fn given_crlf_frame_when_parsed_then_header_and_body_clean() {
    let response = Response::parse("PING\r\n{\"status_message\": \"OK\"}\r\n");

    assert_eq!(response.header, "PING");
    assert!(response.is_ok());
}

/// **VALUE**: Verifies that an unknown or missing status counts as failure.
///
/// **BUG THIS CATCHES**: Would catch treating "anything but ERROR" as success.
#[test]
fn given_unknown_or_missing_status_when_checked_then_error() {
    let unknown = Response::parse("PING\n{\"status_message\": \"MAYBE\"}");
    let missing = Response::parse("PING\n{\"result\": 1}");

    assert_eq!(unknown.status(), StatusMessage::Error);
    assert_eq!(missing.status(), StatusMessage::Error);
}

/// **VALUE**: Verifies the locally built ERROR response shape callers render.
#[test]
fn given_local_error_when_built_then_has_status_and_message() {
    let response = Response::error("no peer connected");

    assert_eq!(response.header, "ERROR");
    assert_eq!(
        serde_json::Value::Object(response.into_body()),
        json!({"status_message": "ERROR", "error_message": "no peer connected"})
    );
}
