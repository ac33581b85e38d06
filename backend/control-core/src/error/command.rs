use common::ErrorLocation;

use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Problems found while turning a command into a wire frame.
///
/// These are raised before any byte reaches the socket; the caller has to
/// fix the command it built.
#[derive(Debug, ThisError)]
pub enum CommandError {
    #[error("Missing Field Error: {command} requires `{field}` {location}")]
    MissingField {
        command: &'static str,
        field: &'static str,
        location: ErrorLocation,
    },

    #[error("File Not Found Error: {path} {location}")]
    FileNotFound {
        path: PathBuf,
        location: ErrorLocation,
    },

    #[error("File Metadata Error: {path}: {source} {location}")]
    FileMetadata {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: std::io::Error,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}

impl From<serde_json::Error> for CommandError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        CommandError::Encode {
            message: error.to_string(),
            location: ErrorLocation::here(),
        }
    }
}
