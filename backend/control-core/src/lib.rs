//! Command/control channel for the display installation.
//!
//! The control application drives a single remote rendering client (the
//! peer) over one long-lived TCP connection. This crate owns that
//! connection end to end:
//!
//! - [`command`] - typed command kinds and their `"<NAME> <size>\n<json>"` frames
//! - [`response`] - parsing of `"<HEADER>\n<json>"` response frames
//! - [`channel`] - the connection channel, its supervisor and the calling facade
//! - [`config`] - persisted channel settings
//!
//! # Architecture
//!
//! One [`channel::ChannelSupervisor`] is built at process start. It owns the
//! listening socket and a background task that accepts the peer and polls
//! it for liveness. Everything else talks to the peer through a cloned
//! [`channel::DisplayClient`], which serializes callers on a single-writer
//! lock so frames from two callers never interleave on the wire.

pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod response;

#[cfg(test)]
mod tests;

pub const DEFAULT_CONTROL_HOST: &str = "0.0.0.0";
pub const DEFAULT_CONTROL_PORT: u16 = 8765;
pub const DEFAULT_CONTROL_ADDRESS: &str =
    const_format::concatcp!(DEFAULT_CONTROL_HOST, ":", DEFAULT_CONTROL_PORT);

/// Line written to the peer when the control side shuts down.
pub const SHUTDOWN_TOKEN: &str = "quit\n";
