// Unit tests for error classification and caller-facing messages.

use crate::error::channel::ChannelError;
use crate::error::command::CommandError;
use crate::response::Response;

use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};

/// **VALUE**: Verifies that disconnect-type I/O errors are classified as peer closure.
///
/// **BUG THIS CATCHES**: Would catch a reset connection being reported as a generic read
/// failure, which hides from operators that the display went away.
#[test]
fn given_reset_io_error_when_converted_then_peer_closed() {
    let error = ChannelError::read(IoError::from(ErrorKind::ConnectionReset));

    assert!(matches!(error, ChannelError::PeerClosed { .. }));
    assert!(error.breaks_connection());
}

/// **VALUE**: Verifies that validation errors and refusals keep the connection.
///
/// **WHY THIS MATTERS**: Dropping the display over a typo in a command would force a
/// reconnect for nothing.
#[test]
fn given_non_transport_errors_when_classified_then_connection_kept() {
    let missing = ChannelError::from(CommandError::MissingField {
        command: "DELETE",
        field: "object_id",
        location: ErrorLocation::here(),
    });
    let rejected = ChannelError::TransferRejected {
        response: Box::new(Response::error("disk full")),
        location: ErrorLocation::here(),
    };

    assert!(!missing.breaks_connection());
    assert!(!rejected.breaks_connection());
    assert!(
        ChannelError::write(IoError::from(ErrorKind::TimedOut)).breaks_connection()
    );
}

/// **VALUE**: Verifies the summary shown to users carries no source location.
#[test]
fn given_channel_error_when_summarized_then_no_location_brackets() {
    let error = ChannelError::ShortTransfer {
        expected: 10,
        sent: 4,
        location: ErrorLocation::here(),
    };

    assert_eq!(error.summary(), "file ended after 4 of 10 bytes");
    assert!(error.to_string().contains(".rs:"), "Display keeps the location");
}
