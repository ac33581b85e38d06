//! Connection channel, supervisor and calling facade.
//!
//! # Protocol
//!
//! Text frames over one TCP connection to exactly one peer:
//!
//! ```text
//! request:  <COMMAND_NAME> <body_size_bytes>\n<json_body>
//! response: <STATUS_HEADER>\n<json_body>\n
//! ```
//!
//! A TRANSFER is a two-phase exchange: the metadata frame must be answered
//! `OK` before `file_size` raw bytes are streamed, after which a second
//! response confirms receipt. Responses are matched to requests by order
//! alone, so only one request is ever in flight.

mod connection;
mod connection_channel;
mod facade;
mod state;
mod supervisor;

pub use connection_channel::{ConnectionChannel, NO_PEER_MESSAGE};
pub use facade::DisplayClient;
pub use state::ConnectionState;
pub use supervisor::ChannelSupervisor;
