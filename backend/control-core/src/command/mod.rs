//! Command model.
//!
//! Every command kind the display understands is one variant of
//! [`Command`]. A command turns into exactly one request frame:
//!
//! ```text
//! <COMMAND_NAME> <body_size_bytes>\n<json_body>
//! ```
//!
//! where `body_size_bytes` is the byte length of `json_body`. There is no
//! trailing newline; the peer reads exactly `body_size_bytes` after the
//! header line.

mod encoding;
mod payload;

pub use encoding::{AsciiJsonFormatter, encode_body};
pub(crate) use payload::TRANSFER;
pub use payload::{ControlCommand, DeleteCommand, TransferCommand, TransferMetadata, UpdateCommand};

use crate::error::command::CommandError;

use serde::Serialize;
use serde_json::{Map, Value};

/// Body of the commands that carry no fields.
#[derive(Debug, Serialize)]
struct EmptyBody {}

/// A command for the display peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Control(ControlCommand),
    Transfer(TransferCommand),
    Update(UpdateCommand),
    Delete(DeleteCommand),
    List,
    Ping,
    GetModel,
    Next,
    Previous,
}

impl Command {
    pub fn control(
        object_id: impl Into<String>,
        action: impl Into<String>,
        action_parameters: Map<String, Value>,
    ) -> Self {
        Command::Control(
            ControlCommand::default()
                .with_object_id(object_id)
                .with_action(action)
                .with_action_parameters(action_parameters),
        )
    }

    pub fn transfer(file_path: impl Into<std::path::PathBuf>) -> Self {
        Command::Transfer(TransferCommand::new(file_path))
    }

    pub fn update(file_name: impl Into<String>) -> Self {
        Command::Update(UpdateCommand::default().with_file_name(file_name))
    }

    pub fn delete(object_id: impl Into<String>) -> Self {
        Command::Delete(DeleteCommand::default().with_object_id(object_id))
    }

    /// Wire name of the command kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Control(_) => payload::CONTROL,
            Command::Transfer(_) => payload::TRANSFER,
            Command::Update(_) => payload::UPDATE,
            Command::Delete(_) => payload::DELETE,
            Command::List => "LIST",
            Command::Ping => "PING",
            Command::GetModel => "GET_MODEL",
            Command::Next => "NEXT",
            Command::Previous => "PREVIOUS",
        }
    }

    /// Whether the command is followed by a raw byte stream.
    pub const fn carries_file(&self) -> bool {
        matches!(self, Command::Transfer(_))
    }

    /// Compute and encode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::MissingField`] if a required field was never
    /// set, and the file errors of [`TransferCommand::metadata`] for
    /// transfers.
    #[track_caller]
    pub fn encode_body(&self) -> Result<String, CommandError> {
        match self {
            Command::Control(command) => encode_body(&command.body()?),
            Command::Transfer(command) => encode_body(&command.metadata()?),
            Command::Update(command) => encode_body(&command.body()?),
            Command::Delete(command) => encode_body(&command.body()?),
            Command::List | Command::Ping | Command::GetModel | Command::Next | Command::Previous => {
                encode_body(&EmptyBody {})
            }
        }
    }

    /// Build the request frame.
    ///
    /// Validation happens here, before any I/O: a command that fails to
    /// serialize never reaches the socket.
    #[track_caller]
    pub fn serialize(&self) -> Result<Vec<u8>, CommandError> {
        let body = self.encode_body()?;
        Ok(frame(self.name(), &body))
    }
}

pub(crate) fn frame(name: &str, body: &str) -> Vec<u8> {
    let header = format!("{name} {}\n", body.len());
    let mut bytes = Vec::with_capacity(header.len() + body.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(body.as_bytes());
    bytes
}
