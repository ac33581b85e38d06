//! Line-oriented operator console.
//!
//! Each input line becomes one command for the display; the response body
//! is printed as a single JSON line. Lines look like:
//!
//! ```text
//! list | ping | model | next | prev | status | help | quit
//! delete <object_id>
//! update <file_name>
//! transfer <path>
//! control <object_id> <action> [json object]
//! ```

use crate::error::DisplayControlError;

use common::ErrorLocation;

use control_core::channel::DisplayClient;
use control_core::command::Command;

use std::io::{BufRead, stdin};
use std::panic::Location;
use std::thread;

use log::{debug, warn};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

const INPUT_BUFFER: usize = 16;

pub const HELP: &str = "\
commands:
  list                                  list objects on the display
  model                                 current model
  next | prev                           switch displayed object
  control <id> <action> [json object]   act on an object
  delete <id>                           remove an object
  update <file_name>                    reload an object from a file
  transfer <path>                       upload a model file
  ping                                  check the display answers
  status                                connection state
  help | quit";

/// What one console line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Issue(Command),
    Status,
    Help,
    Quit,
}

/// Parse one line; `Ok(None)` for blank lines.
///
/// # Errors
///
/// Returns [`DisplayControlError::Console`] for unknown verbs, missing
/// arguments, or action parameters that are not a JSON object.
#[track_caller]
pub fn parse_line(line: &str) -> Result<Option<ConsoleAction>, DisplayControlError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let action = match verb.to_ascii_lowercase().as_str() {
        "list" => ConsoleAction::Issue(Command::List),
        "ping" => ConsoleAction::Issue(Command::Ping),
        "model" => ConsoleAction::Issue(Command::GetModel),
        "next" => ConsoleAction::Issue(Command::Next),
        "prev" | "previous" => ConsoleAction::Issue(Command::Previous),
        "delete" => ConsoleAction::Issue(Command::delete(argument(rest, "delete <id>")?)),
        "update" => ConsoleAction::Issue(Command::update(argument(rest, "update <file_name>")?)),
        "transfer" => ConsoleAction::Issue(Command::transfer(argument(rest, "transfer <path>")?)),
        "control" => ConsoleAction::Issue(parse_control(rest)?),
        "status" => ConsoleAction::Status,
        "help" | "?" => ConsoleAction::Help,
        "quit" | "exit" => ConsoleAction::Quit,
        other => {
            return Err(DisplayControlError::Console {
                message: format!("unknown command `{other}`, try `help`"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    };

    Ok(Some(action))
}

#[track_caller]
fn argument<'a>(rest: &'a str, usage: &str) -> Result<&'a str, DisplayControlError> {
    if rest.is_empty() {
        return Err(DisplayControlError::Console {
            message: format!("usage: {usage}"),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(rest)
}

#[track_caller]
fn parse_control(rest: &str) -> Result<Command, DisplayControlError> {
    let mut parts = rest.splitn(3, char::is_whitespace);
    let (Some(object_id), Some(action)) = (
        parts.next().filter(|p| !p.is_empty()),
        parts.next().filter(|p| !p.is_empty()),
    ) else {
        return Err(DisplayControlError::Console {
            message: "usage: control <id> <action> [json object]".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    };

    let parameters = match parts.next().map(str::trim).filter(|p| !p.is_empty()) {
        None => Map::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                return Err(DisplayControlError::Console {
                    message: format!("action parameters must be a JSON object, got `{raw}`"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        },
    };

    Ok(Command::control(object_id, action, parameters))
}

/// Feed stdin lines from a plain OS thread.
///
/// The thread blocks in `read_line` and is never joined, so the runtime can
/// shut down while it waits for input. The channel closes at end of input
/// or on a read error.
///
/// # Errors
///
/// Returns [`DisplayControlError::App`] if the thread cannot be spawned.
pub fn stdin_lines() -> Result<mpsc::Receiver<String>, DisplayControlError> {
    let (sender, receiver) = mpsc::channel(INPUT_BUFFER);

    thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Console input failed: {e}");
                        break;
                    }
                }
            }
        })
        .map_err(|e| DisplayControlError::App {
            message: format!("Failed to start console input thread: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

    Ok(receiver)
}

/// Handle lines from `input` until it closes or `quit`, writing one result line each.
///
/// # Errors
///
/// Only write errors on `output` end the loop; bad lines and failed
/// commands are reported on `output`.
pub async fn run<W>(
    client: &DisplayClient,
    mut input: mpsc::Receiver<String>,
    output: &mut W,
) -> Result<(), DisplayControlError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = input.recv().await {
        let reply = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(ConsoleAction::Quit)) => break,
            Ok(Some(ConsoleAction::Help)) => HELP.to_string(),
            Ok(Some(ConsoleAction::Status)) => status_line(client),
            Ok(Some(ConsoleAction::Issue(command))) => {
                debug!("Console issuing {}", command.name());
                match client.send_command(&command).await {
                    Ok(response) => Value::Object(response.into_body()).to_string(),
                    Err(e) => {
                        warn!("Console command rejected: {e}");
                        json!({"status_message": "ERROR", "error_message": e.to_string()}).to_string()
                    }
                }
            }
            Err(DisplayControlError::Console { message, .. }) => format!("error: {message}"),
            Err(e) => format!("error: {e}"),
        };

        output
            .write_all(format!("{reply}\n").as_bytes())
            .await
            .map_err(io_error)?;
        output.flush().await.map_err(io_error)?;
    }

    Ok(())
}

fn status_line(client: &DisplayClient) -> String {
    json!({
        "state": client.state().to_string(),
        "peer": client.peer_address().map(|address| address.to_string()),
    })
    .to_string()
}

#[track_caller]
fn io_error(error: std::io::Error) -> DisplayControlError {
    DisplayControlError::App {
        message: format!("console I/O failed: {error}"),
        location: ErrorLocation::from(Location::caller()),
    }
}
