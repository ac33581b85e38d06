use crate::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StatusError {
    #[error("Unknown Status Error: {value} {location}")]
    Unknown {
        value: String,
        location: ErrorLocation,
    },
}
