//! Status vocabulary carried in every response body.

use crate::{ErrorLocation, StatusError};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Key under which the peer reports the outcome of a command.
pub const STATUS_MESSAGE_KEY: &str = "status_message";

/// Key under which a human-readable failure reason is reported.
pub const ERROR_MESSAGE_KEY: &str = "error_message";

/// Outcome of a command as reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusMessage {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

impl StatusMessage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StatusMessage::Ok => "OK",
            StatusMessage::Error => "ERROR",
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusMessage {
    type Err = StatusError;

    #[track_caller]
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "OK" => Ok(StatusMessage::Ok),
            "ERROR" => Ok(StatusMessage::Error),
            other => Err(StatusError::Unknown {
                value: other.to_string(),
                location: ErrorLocation::here(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StatusMessage;

    /// **VALUE**: Verifies the status strings match what the display peer sends.
    ///
    /// **BUG THIS CATCHES**: Would catch a rename of the serde tags, which would make every
    /// peer response look like a failure.
    #[test]
    fn given_wire_status_strings_when_parsed_then_map_to_variants() {
        // GIVEN / WHEN / THEN
        assert_eq!("OK".parse::<StatusMessage>().unwrap(), StatusMessage::Ok);
        assert_eq!("ERROR".parse::<StatusMessage>().unwrap(), StatusMessage::Error);
        assert!("MAYBE".parse::<StatusMessage>().is_err());
        assert_eq!(serde_json::to_string(&StatusMessage::Ok).unwrap(), "\"OK\"");
    }
}
