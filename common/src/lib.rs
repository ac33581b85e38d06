//! Shared building blocks for the display control workspace.
//!
//! Everything here is a leaf: error location tracking used by every error
//! enum in the workspace, and the status vocabulary both ends of the control
//! channel agree on.

pub mod error;
pub mod status;

pub use error::error_location::ErrorLocation;
pub use error::status_error::StatusError;
pub use status::StatusMessage;

#[cfg(test)]
mod tests;
