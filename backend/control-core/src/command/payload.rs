//! Typed payloads for the command kinds that carry a body.
//!
//! Fields are set through `with_*` methods and checked when the body is
//! computed, so a half-built command fails with
//! [`CommandError::MissingField`] instead of reaching the wire with a
//! default value.

use crate::error::command::CommandError;

use common::ErrorLocation;

use std::io::ErrorKind;
use std::panic::Location;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

pub(crate) const CONTROL: &str = "CONTROL";
pub(crate) const TRANSFER: &str = "TRANSFER";
pub(crate) const UPDATE: &str = "UPDATE";
pub(crate) const DELETE: &str = "DELETE";

#[track_caller]
fn require<'a, T: ?Sized>(
    value: Option<&'a T>,
    command: &'static str,
    field: &'static str,
) -> Result<&'a T, CommandError> {
    value.ok_or_else(|| CommandError::MissingField {
        command,
        field,
        location: ErrorLocation::from(Location::caller()),
    })
}

// ============================================
// CONTROL
// ============================================

/// Drive an object on the display (rotate, switch, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlCommand {
    object_id: Option<String>,
    action: Option<String>,
    action_parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ControlBody<'a> {
    object_id: &'a str,
    action: &'a str,
    action_parameters: &'a Map<String, Value>,
}

impl ControlCommand {
    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_action_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.action_parameters = Some(parameters);
        self
    }

    #[track_caller]
    pub(crate) fn body(&self) -> Result<ControlBody<'_>, CommandError> {
        Ok(ControlBody {
            object_id: require(self.object_id.as_deref(), CONTROL, "object_id")?,
            action: require(self.action.as_deref(), CONTROL, "action")?,
            action_parameters: require(self.action_parameters.as_ref(), CONTROL, "action_parameters")?,
        })
    }
}

// ============================================
// TRANSFER
// ============================================

/// Upload a model file to the display.
///
/// Only the local path is stored. `file_name` and `file_size` are read from
/// the filesystem each time the body is computed, so the advertised size
/// matches the file as it is when the frame goes out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferCommand {
    file_path: Option<PathBuf>,
}

/// Metadata half of a transfer, as announced to the peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferMetadata {
    pub file_name: String,
    pub file_size: u64,
}

impl TransferCommand {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self::default().with_file_path(file_path)
    }

    pub fn with_file_path(mut self, file_path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Resolve the announced name and size from the local file.
    ///
    /// # Errors
    ///
    /// - [`CommandError::MissingField`] if no path was set
    /// - [`CommandError::FileNotFound`] if the path does not exist
    /// - [`CommandError::FileMetadata`] if the path is not a readable regular file
    #[track_caller]
    pub fn metadata(&self) -> Result<TransferMetadata, CommandError> {
        self.resolve().map(|(_, metadata)| metadata)
    }

    #[track_caller]
    pub(crate) fn resolve(&self) -> Result<(&Path, TransferMetadata), CommandError> {
        let path = require(self.file_path.as_deref(), TRANSFER, "file_path")?;

        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CommandError::FileNotFound {
                path: path.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
            },
            _ => CommandError::FileMetadata {
                path: path.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            },
        })?;

        if !metadata.is_file() {
            return Err(CommandError::FileMetadata {
                path: path.to_path_buf(),
                location: ErrorLocation::from(Location::caller()),
                source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CommandError::MissingField {
                command: TRANSFER,
                field: "file_name",
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok((
            path,
            TransferMetadata {
                file_name,
                file_size: metadata.len(),
            },
        ))
    }
}

// ============================================
// UPDATE
// ============================================

/// Ask the display to reload an object from a file it already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCommand {
    file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateBody<'a> {
    file_name: &'a str,
}

impl UpdateCommand {
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    #[track_caller]
    pub(crate) fn body(&self) -> Result<UpdateBody<'_>, CommandError> {
        Ok(UpdateBody {
            file_name: require(self.file_name.as_deref(), UPDATE, "file_name")?,
        })
    }
}

// ============================================
// DELETE
// ============================================

/// Remove an object from the display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteCommand {
    object_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteBody<'a> {
    object_id: &'a str,
}

impl DeleteCommand {
    pub fn with_object_id(mut self, object_id: impl Into<String>) -> Self {
        self.object_id = Some(object_id.into());
        self
    }

    #[track_caller]
    pub(crate) fn body(&self) -> Result<DeleteBody<'_>, CommandError> {
        Ok(DeleteBody {
            object_id: require(self.object_id.as_deref(), DELETE, "object_id")?,
        })
    }
}
