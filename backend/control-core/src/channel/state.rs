//! Connection lifecycle of the control channel.

use std::fmt;

/// Where the channel is in its peer lifecycle.
///
/// Published on a `watch` channel; see
/// [`ConnectionChannel::subscribe`](crate::channel::ConnectionChannel::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Listener is bound and waiting for the display to connect.
    Listening,
    /// Exactly one peer is connected.
    Connected,
    /// No listener or no peer: before start, after a drop, after stop.
    #[default]
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Listening => "LISTENING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Disconnected => "DISCONNECTED",
        };
        f.write_str(label)
    }
}
