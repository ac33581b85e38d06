use common::ErrorLocation;

use control_core::error::CoreError;

use thiserror::Error;

/// Errors surfaced by the hosting process.
#[derive(Debug, Error)]
pub enum DisplayControlError {
    /// Error from this App
    #[error("Display Control Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Operator typed something the console cannot turn into a command
    #[error("Console Error: {message} {location}")]
    Console {
        message: String,
        location: ErrorLocation,
    },

    /// Error from control-core (config, channel, supervisor)
    #[error(transparent)]
    Core(#[from] CoreError),
}
