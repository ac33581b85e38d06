use crate::error::command::CommandError;
use crate::response::Response;

use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error as ThisError;

/// Transport and protocol failures on the peer connection.
#[derive(Debug, ThisError)]
pub enum ChannelError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Already Connected Error: refused {refused}, {current} is connected {location}")]
    AlreadyConnected {
        current: SocketAddr,
        refused: SocketAddr,
        location: ErrorLocation,
    },

    #[error("Accept Error: {message} {location}")]
    Accept {
        message: String,
        location: ErrorLocation,
    },

    #[error("Write Error: {message} {location}")]
    Write {
        message: String,
        location: ErrorLocation,
    },

    #[error("Read Error: {message} {location}")]
    Read {
        message: String,
        location: ErrorLocation,
    },

    #[error("Peer Closed Error: {message} {location}")]
    PeerClosed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Transfer Rejected Error: {} {location}", response.error_message().unwrap_or("peer refused the transfer"))]
    TransferRejected {
        response: Box<Response>,
        location: ErrorLocation,
    },

    #[error("Short Transfer Error: sent {sent} of {expected} bytes {location}")]
    ShortTransfer {
        expected: u64,
        sent: u64,
        location: ErrorLocation,
    },

    #[error("Source File Error: {path}: {source} {location}")]
    SourceFile {
        path: PathBuf,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },
}

impl ChannelError {
    #[track_caller]
    pub(crate) fn write(error: IoError) -> Self {
        if is_disconnect(&error) {
            return ChannelError::PeerClosed {
                message: error.to_string(),
                location: ErrorLocation::here(),
            };
        }
        ChannelError::Write {
            message: error.to_string(),
            location: ErrorLocation::here(),
        }
    }

    #[track_caller]
    pub(crate) fn read(error: IoError) -> Self {
        if is_disconnect(&error) {
            return ChannelError::PeerClosed {
                message: error.to_string(),
                location: ErrorLocation::here(),
            };
        }
        ChannelError::Read {
            message: error.to_string(),
            location: ErrorLocation::here(),
        }
    }

    #[track_caller]
    pub(crate) fn source_file(path: &Path, error: IoError) -> Self {
        ChannelError::SourceFile {
            path: path.to_path_buf(),
            location: ErrorLocation::here(),
            source: error,
        }
    }

    /// Message for callers that only show text, without the source location.
    pub fn summary(&self) -> String {
        match self {
            ChannelError::Command(error) => error.to_string(),
            ChannelError::AlreadyConnected { current, refused, .. } => {
                format!("refused {refused}: {current} is already connected")
            }
            ChannelError::Accept { message, .. }
            | ChannelError::Write { message, .. }
            | ChannelError::Read { message, .. }
            | ChannelError::PeerClosed { message, .. }
            | ChannelError::Timeout { message, .. } => message.clone(),
            ChannelError::TransferRejected { response, .. } => response
                .error_message()
                .unwrap_or("peer refused the transfer")
                .to_string(),
            ChannelError::ShortTransfer { expected, sent, .. } => {
                format!("file ended after {sent} of {expected} bytes")
            }
            ChannelError::SourceFile { path, source, .. } => {
                format!("cannot read {}: {source}", path.display())
            }
        }
    }

    /// Whether the connection can no longer be trusted after this error.
    ///
    /// Validation failures and a refused transfer leave the socket in a
    /// well-defined state; everything else may have left half a frame on
    /// the wire.
    pub fn breaks_connection(&self) -> bool {
        !matches!(
            self,
            ChannelError::Command(_)
                | ChannelError::TransferRejected { .. }
                | ChannelError::AlreadyConnected { .. }
                | ChannelError::Accept { .. }
        )
    }
}

fn is_disconnect(error: &IoError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
    )
}
