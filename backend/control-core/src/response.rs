//! Response model.
//!
//! A response frame is one header line followed by one JSON body line:
//!
//! ```text
//! <STATUS_HEADER>\n<json_body>
//! ```
//!
//! Parsing never fails. A body that is not a JSON object becomes a
//! synthetic `ERROR` body carrying the decode error, so malformed peer
//! output reaches the caller as an ordinary error result.

use common::StatusMessage;
use common::status::{ERROR_MESSAGE_KEY, STATUS_MESSAGE_KEY};

use serde::Serialize;
use serde_json::{Map, Value};

/// Key holding the payload of LIST and GET_MODEL responses.
pub const RESULT_KEY: &str = "result";

/// Header used for responses synthesized on this side of the wire.
pub const LOCAL_ERROR_HEADER: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub header: String,
    pub body: Map<String, Value>,
}

impl Response {
    /// Parse one response frame.
    pub fn parse(raw: &str) -> Self {
        let (header, body) = raw.split_once('\n').unwrap_or((raw, ""));
        let header = header.trim_end_matches('\r').trim().to_string();
        let body = body.trim_end_matches(['\r', '\n']);

        match serde_json::from_str::<Map<String, Value>>(body) {
            Ok(body) => Self { header, body },
            Err(e) => Self {
                header,
                body: error_body(e.to_string()),
            },
        }
    }

    /// An `ERROR` response produced locally (no peer, transport failure).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            header: LOCAL_ERROR_HEADER.to_string(),
            body: error_body(message.into()),
        }
    }

    /// Status reported in the body; anything but `"OK"` counts as an error.
    pub fn status(&self) -> StatusMessage {
        match self.body.get(STATUS_MESSAGE_KEY).and_then(Value::as_str) {
            Some(status) => status.parse().unwrap_or(StatusMessage::Error),
            None => StatusMessage::Error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status() == StatusMessage::Ok
    }

    pub fn error_message(&self) -> Option<&str> {
        self.body.get(ERROR_MESSAGE_KEY).and_then(Value::as_str)
    }

    pub fn result(&self) -> Option<&Value> {
        self.body.get(RESULT_KEY)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    /// Consume the response, keeping only the body mapping.
    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }
}

fn error_body(message: String) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert(
        STATUS_MESSAGE_KEY.to_string(),
        Value::String(StatusMessage::Error.as_str().to_string()),
    );
    body.insert(ERROR_MESSAGE_KEY.to_string(), Value::String(message));
    body
}
