// Unit tests for the command model: frame grammar, body encoding, validation.

use crate::command::{Command, ControlCommand, TransferCommand, encode_body};
use crate::error::command::CommandError;
use crate::response::Response;

use std::io::Write;

use serde_json::{Map, Value, json};

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn split_frame(frame: &[u8]) -> (String, usize, String) {
    let text = String::from_utf8(frame.to_vec()).expect("frame should be UTF-8");
    let (header, body) = text.split_once('\n').expect("frame should have a header line");
    let (name, size) = header.split_once(' ').expect("header should be `NAME SIZE`");
    (
        name.to_string(),
        size.parse().expect("size should be a number"),
        body.to_string(),
    )
}

/// **VALUE**: Pins the exact frame the display expects for a CONTROL command.
///
/// **WHY THIS MATTERS**: The display reads `body_size` bytes after the header line. If
/// the advertised size disagrees with the encoded body by even one byte, the display
/// either blocks forever or swallows the start of the next frame.
///
/// **BUG THIS CATCHES**: Would catch a change of separators (`,` vs `, `), field order,
/// or a size computed on characters instead of bytes.
#[test]
fn given_control_command_when_serialized_then_header_size_matches_body_bytes() {
    // GIVEN: The reference CONTROL command
    let command = Command::control("123", "next", params(json!({"operation": "next"})));
    let expected_body =
        r#"{"object_id": "123", "action": "next", "action_parameters": {"operation": "next"}}"#;

    // WHEN: Serializing
    let frame = command.serialize().expect("complete command should serialize");

    // THEN: Header is `CONTROL <N>` with N the byte length of the body
    let (name, size, body) = split_frame(&frame);
    assert_eq!(name, "CONTROL");
    assert_eq!(body, expected_body);
    assert_eq!(size, expected_body.len());
    assert_eq!(
        String::from_utf8(frame).unwrap(),
        format!("CONTROL {}\n{expected_body}", expected_body.len())
    );
}

/// **VALUE**: Verifies that a serialized command decodes back to the same name and body
/// through the response parser's JSON decoder.
///
/// **BUG THIS CATCHES**: Would catch an encoder that emits JSON the decoder reads
/// differently (escaping, number formatting, key order).
#[test]
fn given_every_command_kind_when_serialized_then_body_round_trips_through_response_parser() {
    // GIVEN: One of each kind that needs no file
    let cases = vec![
        (
            Command::control("7", "rotate", params(json!({"axis": "y", "degrees": 90.5}))),
            json!({"object_id": "7", "action": "rotate", "action_parameters": {"axis": "y", "degrees": 90.5}}),
        ),
        (Command::update("chair.glb"), json!({"file_name": "chair.glb"})),
        (Command::delete("42"), json!({"object_id": "42"})),
        (Command::List, json!({})),
        (Command::Ping, json!({})),
        (Command::GetModel, json!({})),
        (Command::Next, json!({})),
        (Command::Previous, json!({})),
    ];

    for (command, expected) in cases {
        // WHEN: Serializing and parsing the frame back
        let frame = command.serialize().unwrap();
        let parsed = Response::parse(&String::from_utf8(frame).unwrap());

        // THEN: Name is the first header token and the body is unchanged
        assert_eq!(
            parsed.header.split_whitespace().next(),
            Some(command.name())
        );
        assert_eq!(Value::Object(parsed.body), expected, "{}", command.name());
    }
}

/// **VALUE**: Verifies that half-built commands fail fast and name the missing field.
///
/// **BUG THIS CATCHES**: Would catch a regression that fills missing fields with
/// defaults (empty strings) and sends a command the display cannot act on.
#[test]
fn given_control_without_action_when_serialized_then_missing_field_error() {
    // GIVEN: A CONTROL command with no action
    let command = Command::Control(
        ControlCommand::default()
            .with_object_id("123")
            .with_action_parameters(Map::new()),
    );

    // WHEN: Serializing
    let result = command.serialize();

    // THEN: MissingField naming `action`
    match result {
        Err(CommandError::MissingField { command, field, .. }) => {
            assert_eq!(command, "CONTROL");
            assert_eq!(field, "action");
        }
        other => panic!("expected MissingField, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a TRANSFER of a nonexistent path fails before any frame exists.
///
/// **BUG THIS CATCHES**: Would catch announcing a zero-byte file instead of failing, which
/// would make the display create an empty model.
#[test]
fn given_transfer_of_missing_file_when_serialized_then_file_not_found() {
    // GIVEN: A path that does not exist
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.glb");

    // WHEN: Serializing
    let result = Command::transfer(&missing).serialize();

    // THEN: FileNotFound with that path
    match result {
        Err(CommandError::FileNotFound { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected FileNotFound, got {other:?}"),
    }
}

/// **VALUE**: Verifies that TRANSFER derives its name and size from the file on disk.
///
/// **BUG THIS CATCHES**: Would catch announcing the full path instead of the file name, or a
/// size read from somewhere other than the file metadata.
#[test]
fn given_existing_file_when_transfer_serialized_then_announces_name_and_size() {
    // GIVEN: A 1234-byte file
    let mut file = tempfile::Builder::new()
        .prefix("model-")
        .suffix(".glb")
        .tempfile()
        .unwrap();
    file.write_all(&vec![7u8; 1234]).unwrap();
    let expected_name = file
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();

    // WHEN: Serializing
    let frame = Command::transfer(file.path()).serialize().unwrap();

    // THEN: Metadata body carries file_name then file_size
    let (name, size, body) = split_frame(&frame);
    assert_eq!(name, "TRANSFER");
    assert_eq!(size, body.len());
    assert_eq!(
        body,
        format!(r#"{{"file_name": "{expected_name}", "file_size": 1234}}"#)
    );
}

/// **VALUE**: Verifies that a TRANSFER without a path is a missing-field error.
#[test]
fn given_transfer_without_path_when_metadata_requested_then_missing_field() {
    let result = TransferCommand::default().metadata();

    assert!(matches!(
        result,
        Err(CommandError::MissingField { field: "file_path", .. })
    ));
}

/// **VALUE**: Verifies that a directory is rejected as a transfer source.
#[test]
fn given_directory_when_transfer_metadata_requested_then_file_metadata_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = TransferCommand::new(dir.path()).metadata();

    assert!(matches!(result, Err(CommandError::FileMetadata { .. })));
}

/// **VALUE**: Verifies that non-ASCII text is escaped so the body stays pure ASCII.
///
/// **WHY THIS MATTERS**: Object names typed by operators contain accents and emoji. The
/// advertised size must count exactly the bytes on the wire.
///
/// **BUG THIS CATCHES**: Would catch raw UTF-8 leaking into the body, or astral characters
/// not being split into a surrogate pair.
#[test]
fn given_non_ascii_values_when_encoded_then_escaped_as_utf16_units() {
    // GIVEN: A body with a Latin-1 character and an emoji
    let body = json!({"name": "café 🎨"});

    // WHEN: Encoding
    let encoded = encode_body(&body).unwrap();

    // THEN: ASCII-only with \u escapes
    assert!(encoded.is_ascii());
    assert_eq!(encoded, r#"{"name": "caf\u00e9 \ud83c\udfa8"}"#);
    let decoded: Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, body);
}

/// **VALUE**: Verifies array separators match the object separators.
#[test]
fn given_nested_arrays_when_encoded_then_use_comma_space_separators() {
    let encoded = encode_body(&json!({"ids": [1, 2, 3], "empty": []})).unwrap();

    assert_eq!(encoded, r#"{"ids": [1, 2, 3], "empty": []}"#);
}

/// **VALUE**: Verifies only TRANSFER is routed to the file path.
#[test]
fn given_command_kinds_when_checked_then_only_transfer_carries_file() {
    assert!(Command::transfer("model.glb").carries_file());
    assert!(!Command::update("model.glb").carries_file());
    assert!(!Command::Ping.carries_file());
    assert_eq!(Command::GetModel.name(), "GET_MODEL");
    assert_eq!(Command::Previous.name(), "PREVIOUS");
}
