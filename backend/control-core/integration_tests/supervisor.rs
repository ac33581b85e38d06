use crate::helpers::{
    MockPeer, STEP_TIMEOUT, connect_peer, start_supervisor, test_config, wait_for_state,
};

use control_core::SHUTDOWN_TOKEN;
use control_core::channel::{ChannelSupervisor, ConnectionState, NO_PEER_MESSAGE};
use control_core::config::ChannelConfig;

use std::time::Duration;

use tokio::net::TcpStream;

fn fast_liveness() -> ChannelConfig {
    ChannelConfig {
        ping_interval_ms: 50,
        ping_timeout_ms: 50,
        ..test_config()
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// **VALUE**: Verifies `stop()` releases the listener and finishes the background task.
///
/// **WHY THIS MATTERS**: A listener that outlives `stop()` keeps the port busy and makes the
/// next start of the application fail to bind.
///
/// **BUG THIS CATCHES**: Would catch `stop()` returning before the task has dropped the
/// listener, or not stopping the task at all.
#[tokio::test]
async fn given_running_supervisor_when_stopped_then_listener_closed() {
    // GIVEN: A running supervisor
    let (supervisor, address) = start_supervisor(test_config()).await;
    assert!(supervisor.is_running());
    assert_eq!(supervisor.channel().state(), ConnectionState::Listening);

    // WHEN: Stopping it
    let result = tokio::time::timeout(STEP_TIMEOUT, supervisor.stop()).await;

    // THEN: Stop finished, nothing listens on the address any more
    assert!(matches!(result, Ok(Ok(()))), "stop should complete cleanly");
    assert!(!supervisor.is_running());
    assert!(supervisor.local_addr().await.is_none());
    assert_eq!(supervisor.channel().state(), ConnectionState::Disconnected);
    assert!(
        TcpStream::connect(address).await.is_err(),
        "listener should be closed after stop"
    );
}

/// **VALUE**: Verifies a connected display receives the shutdown token and is closed.
///
/// **BUG THIS CATCHES**: Would catch the peer socket being left open after stop, leaving
/// the display convinced it is still controlled.
#[tokio::test]
async fn given_connected_peer_when_stopped_then_peer_gets_shutdown_token_and_eof() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;

    // WHEN: Stopping
    supervisor.stop().await.unwrap();

    // THEN: The display reads one `quit` line then end-of-stream
    let received = peer.read_to_end().await;
    assert_eq!(received, b"quit\n");
    assert_eq!(received, SHUTDOWN_TOKEN.as_bytes());
}

/// **VALUE**: Verifies `stop()` closes the display socket even while a caller is stuck
/// waiting on a display that never answers.
///
/// **WHY THIS MATTERS**: Round trips have no read timeout, so a hung display holds the
/// connection indefinitely. If `stop()` could not take the connection back, the socket
/// would outlive the supervisor and a restarted supervisor would refuse every display as
/// a second peer.
///
/// **BUG THIS CATCHES**: Would catch `close()` waiting on the connection lock (or giving
/// up on it) instead of interrupting the exchange that holds it.
#[tokio::test]
async fn given_hung_command_when_stopped_then_peer_closed_and_restart_accepts_display() {
    // GIVEN: A connected display that reads a LIST and never answers
    let config = ChannelConfig {
        join_timeout_ms: 300,
        ..test_config()
    };
    let (supervisor, address) = start_supervisor(config).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let pending = tokio::spawn(async move { client.list_objects().await });
    assert_eq!(peer.read_frame().await.name, "LIST");

    // WHEN: Stopping while the caller still waits
    let stopped = tokio::time::timeout(STEP_TIMEOUT, supervisor.stop()).await;

    // THEN: Stop completes and the display sees end-of-stream
    assert!(matches!(stopped, Ok(Ok(()))), "stop should complete");
    peer.read_to_end().await;

    // AND: The waiting caller gets an ERROR result instead of hanging
    let response = tokio::time::timeout(STEP_TIMEOUT, pending)
        .await
        .expect("caller should be released by stop")
        .unwrap()
        .unwrap();
    assert!(!response.is_ok());
    assert_eq!(supervisor.channel().peer_address(), None);

    // AND: A restarted supervisor accepts a new display
    supervisor.start().await;
    let restarted = supervisor.local_addr().await.expect("listening again");
    let _display = connect_peer(&supervisor, restarted).await;
    assert!(supervisor.channel().is_connected());

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a failed bind leaves the application in a usable "no display" state.
///
/// **WHY THIS MATTERS**: The rest of the application (object management, chat) is useful
/// without the display. A port clash must not take it down.
///
/// **BUG THIS CATCHES**: Would catch `start()` panicking on bind failure, or commands
/// hanging because the supervisor is half-started.
#[tokio::test]
async fn given_port_in_use_when_started_then_degraded_and_commands_report_no_peer() {
    // GIVEN: A port held by another listener
    let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = blocker.local_addr().unwrap().port();
    let supervisor = ChannelSupervisor::new(ChannelConfig {
        port,
        ..test_config()
    });

    // WHEN: Starting on the same port
    supervisor.start().await;

    // THEN: Not running, commands answer ERROR, stop is a no-op
    assert!(!supervisor.is_running());
    assert!(supervisor.local_addr().await.is_none());
    let response = supervisor.client().ping().await.unwrap();
    assert_eq!(response.error_message(), Some(NO_PEER_MESSAGE));
    assert!(supervisor.stop().await.is_ok());
}

/// **VALUE**: Verifies the supervisor can be started again after a stop.
#[tokio::test]
async fn given_stopped_supervisor_when_started_again_then_listening() {
    let (supervisor, _) = start_supervisor(test_config()).await;
    supervisor.stop().await.unwrap();

    supervisor.start().await;

    assert!(supervisor.is_running());
    assert_eq!(supervisor.channel().state(), ConnectionState::Listening);
    supervisor.stop().await.unwrap();
}

// ============================================================================
// Single-peer invariant
// ============================================================================

/// **VALUE**: Verifies a second display is refused while one is connected.
///
/// **BUG THIS CATCHES**: Would catch the newcomer replacing the live peer, which would cut
/// off the display that is actually on screen.
#[tokio::test]
async fn given_connected_peer_when_second_peer_connects_then_refused() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let first = connect_peer(&supervisor, address).await;
    let first_address = supervisor.client().peer_address();

    // WHEN: A second client connects
    let mut second = MockPeer::connect(address).await;

    // THEN: The second is closed, the first stays the peer
    assert!(second.read_to_end().await.is_empty());
    assert!(supervisor.client().is_connected());
    assert_eq!(supervisor.client().peer_address(), first_address);

    drop(first);
    supervisor.stop().await.unwrap();
}

// ============================================================================
// Liveness polling
// ============================================================================

/// **VALUE**: Verifies three unanswered PINGs drop the peer and the supervisor listens again.
///
/// **WHY THIS MATTERS**: A display that hangs without closing its socket must not block
/// reconnection forever.
///
/// **BUG THIS CATCHES**: Would catch dropping after the first miss, never dropping, or the
/// accept loop not resuming after the drop.
#[tokio::test]
async fn given_silent_peer_when_three_pings_missed_then_disconnected_and_listening() {
    // GIVEN: A connected display that never answers
    let (supervisor, address) = start_supervisor(fast_liveness()).await;
    let mut silent = connect_peer(&supervisor, address).await;
    let mut states = supervisor.subscribe();

    // WHEN: Pings go unanswered
    let mut pings = 0;
    while let Some(frame) = silent.try_read_frame().await {
        assert_eq!(frame.name, "PING");
        pings += 1;
    }

    // THEN: Exactly three pings, then DISCONNECTED, then LISTENING and a new display is accepted
    assert_eq!(pings, 3);
    assert!(wait_for_state(&mut states, ConnectionState::Listening).await);
    let replacement = connect_peer(&supervisor, address).await;
    assert!(supervisor.client().is_connected());

    drop(replacement);
    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a responsive display stays connected across many polls.
#[tokio::test]
async fn given_responsive_peer_when_polled_then_stays_connected() {
    // GIVEN: A display answering every PING
    let (supervisor, address) = start_supervisor(fast_liveness()).await;
    let peer = connect_peer(&supervisor, address).await;
    let answering = tokio::spawn(peer.answer_pings());

    // WHEN: Several poll intervals pass
    tokio::time::sleep(Duration::from_millis(500)).await;

    // THEN: Still connected, and pings were answered
    assert!(supervisor.client().is_connected());
    supervisor.stop().await.unwrap();
    let answered = tokio::time::timeout(STEP_TIMEOUT, answering)
        .await
        .unwrap()
        .unwrap();
    assert!(answered >= 3, "expected several pings, got {answered}");
}

/// **VALUE**: Verifies PING answers without a trailing newline count as answers.
///
/// **BUG THIS CATCHES**: Would catch each such reply timing out as a miss, which drops a
/// healthy display after three polls.
#[tokio::test]
async fn given_peer_answering_without_newline_when_polled_then_stays_connected() {
    // GIVEN: A display whose PING replies end right after the JSON body
    let (supervisor, address) = start_supervisor(fast_liveness()).await;
    let peer = connect_peer(&supervisor, address).await;
    let mut states = supervisor.subscribe();
    let answering = tokio::spawn(peer.answer_pings_ending_with(""));

    // WHEN: Well over three poll intervals pass
    tokio::time::sleep(Duration::from_millis(500)).await;

    // THEN: The display was never dropped
    assert!(supervisor.client().is_connected());
    assert!(!states.has_changed().unwrap(), "state should not have moved");
    supervisor.stop().await.unwrap();
    let answered = tokio::time::timeout(STEP_TIMEOUT, answering)
        .await
        .unwrap()
        .unwrap();
    assert!(answered >= 3, "expected several pings, got {answered}");
}

/// **VALUE**: Verifies a display that disappears is noticed by polling and replaced.
#[tokio::test]
async fn given_peer_drops_when_polled_then_supervisor_accepts_new_peer() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(fast_liveness()).await;
    let peer = connect_peer(&supervisor, address).await;
    let mut states = supervisor.subscribe();

    // WHEN: It closes its socket
    drop(peer);

    // THEN: Liveness notices, listening resumes, a new display connects
    assert!(wait_for_state(&mut states, ConnectionState::Listening).await);
    let replacement = connect_peer(&supervisor, address).await;
    assert!(supervisor.client().is_connected());

    drop(replacement);
    supervisor.stop().await.unwrap();
}
