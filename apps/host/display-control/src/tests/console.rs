// Unit tests for console line parsing

use crate::console::{ConsoleAction, parse_line};
use crate::error::DisplayControlError;

use control_core::command::Command;

use serde_json::{Map, json};

/// **VALUE**: Every bare verb maps to its command.
///
/// **BUG THIS CATCHES**: Would catch a verb wired to the wrong command kind,
/// e.g. `prev` sending NEXT.
#[test]
fn given_bare_verbs_when_parsed_then_map_to_commands() {
    // GIVEN/WHEN/THEN: Each verb, case-insensitive, with surrounding blanks
    let cases = [
        ("list", Command::List),
        ("  PING ", Command::Ping),
        ("model", Command::GetModel),
        ("next", Command::Next),
        ("prev", Command::Previous),
        ("previous", Command::Previous),
    ];

    for (line, expected) in cases {
        let action = parse_line(line).unwrap();
        assert_eq!(action, Some(ConsoleAction::Issue(expected)), "line: {line:?}");
    }
}

/// **VALUE**: Blank input is skipped rather than reported as an error.
#[test]
fn given_blank_line_when_parsed_then_returns_none() {
    assert_eq!(parse_line("").unwrap(), None);
    assert_eq!(parse_line("   \t").unwrap(), None);
}

/// **VALUE**: Arguments keep their spaces after the verb.
///
/// **WHY THIS MATTERS**: Model paths on the display machine often contain spaces.
///
/// **BUG THIS CATCHES**: Would catch splitting the whole line on whitespace.
#[test]
fn given_path_with_spaces_when_parsed_then_argument_is_kept_whole() {
    // GIVEN: A transfer line with a spaced path
    let line = "transfer /srv/models/big house.glb";

    // WHEN: Parsing
    let action = parse_line(line).unwrap();

    // THEN: The whole remainder is the path
    assert_eq!(
        action,
        Some(ConsoleAction::Issue(Command::transfer("/srv/models/big house.glb")))
    );
}

/// **VALUE**: delete/update carry their single argument.
#[test]
fn given_delete_and_update_when_parsed_then_commands_carry_argument() {
    assert_eq!(
        parse_line("delete 7").unwrap(),
        Some(ConsoleAction::Issue(Command::delete("7")))
    );
    assert_eq!(
        parse_line("update chair.glb").unwrap(),
        Some(ConsoleAction::Issue(Command::update("chair.glb")))
    );
}

/// **VALUE**: control accepts an optional JSON object of parameters.
///
/// **BUG THIS CATCHES**: Would catch parameters being dropped or the action
/// swallowing the JSON text.
#[test]
fn given_control_with_parameters_when_parsed_then_parameters_are_decoded() {
    // GIVEN: A control line with a parameter object containing spaces
    let line = r#"control 12 rotate {"angle": 90, "axis": "y"}"#;

    // WHEN: Parsing
    let action = parse_line(line).unwrap();

    // THEN: The command carries id, action and parameters
    let mut parameters = Map::new();
    parameters.insert("angle".to_string(), json!(90));
    parameters.insert("axis".to_string(), json!("y"));
    assert_eq!(
        action,
        Some(ConsoleAction::Issue(Command::control("12", "rotate", parameters)))
    );
}

#[test]
fn given_control_without_parameters_when_parsed_then_parameters_are_empty() {
    assert_eq!(
        parse_line("control 12 hide").unwrap(),
        Some(ConsoleAction::Issue(Command::control("12", "hide", Map::new())))
    );
}

/// **VALUE**: Malformed lines produce a Console error the loop can print.
///
/// **BUG THIS CATCHES**: Would catch a missing argument silently sending an
/// incomplete command, or non-object parameters being accepted.
#[test]
fn given_malformed_lines_when_parsed_then_console_errors() {
    for line in [
        "frobnicate",
        "delete",
        "update   ",
        "transfer",
        "control",
        "control 12",
        "control 12 rotate [1, 2]",
        "control 12 rotate {not json",
    ] {
        let result = parse_line(line);
        assert!(
            matches!(result, Err(DisplayControlError::Console { .. })),
            "line {line:?} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn given_local_verbs_when_parsed_then_map_to_local_actions() {
    assert_eq!(parse_line("status").unwrap(), Some(ConsoleAction::Status));
    assert_eq!(parse_line("help").unwrap(), Some(ConsoleAction::Help));
    assert_eq!(parse_line("?").unwrap(), Some(ConsoleAction::Help));
    assert_eq!(parse_line("quit").unwrap(), Some(ConsoleAction::Quit));
    assert_eq!(parse_line("exit").unwrap(), Some(ConsoleAction::Quit));
}
