use crate::helpers::{
    STEP_TIMEOUT, connect_peer, object, start_supervisor, test_config, wait_for_state,
};

use control_core::channel::{ChannelSupervisor, ConnectionState, NO_PEER_MESSAGE};
use control_core::command::{Command, ControlCommand};
use control_core::error::command::CommandError;

use std::time::Duration;

use serde_json::json;

// ============================================================================
// Commands without a peer
// ============================================================================

/// **VALUE**: Verifies that commands issued with no display connected come back as ERROR
/// responses instead of errors or hangs.
///
/// **WHY THIS MATTERS**: The UI and agent tools keep working while the display is off;
/// they need a message to show, not a transport exception.
///
/// **BUG THIS CATCHES**: Would catch a facade that waits for a peer, or that attempts a
/// write on a missing socket and surfaces the I/O error.
#[tokio::test]
async fn given_no_peer_when_send_command_then_error_response() {
    // GIVEN: A supervisor that was never started
    let supervisor = ChannelSupervisor::new(test_config());
    let client = supervisor.client();

    // WHEN: Issuing commands
    let list = client.list_objects().await.expect("LIST is valid");
    let control = client
        .control("1", "next", object(json!({"operation": "next"})))
        .await
        .expect("CONTROL is valid");

    // THEN: Both are ERROR responses naming the missing peer
    for response in [list, control] {
        assert!(!response.is_ok());
        assert_eq!(response.error_message(), Some(NO_PEER_MESSAGE));
    }
    assert!(!client.is_connected());
}

// ============================================================================
// Request / response round trips
// ============================================================================

/// **VALUE**: Verifies a LIST round trip end to end: frame on the wire, parsed result back.
///
/// **BUG THIS CATCHES**: Would catch a frame written without its body, a response read
/// before the header line completes, or the result field being dropped.
#[tokio::test]
async fn given_connected_peer_when_list_sent_then_result_returned() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();

    // WHEN: Sending LIST while the display answers
    let display = tokio::spawn(async move {
        let frame = peer.read_frame().await;
        assert_eq!(frame.name, "LIST");
        assert_eq!(frame.raw_body, "{}");
        peer.reply(
            "LIST",
            json!({"status_message": "OK", "result": [{"id": "1", "name": "chair"}]}),
        )
        .await;
        peer
    });
    let response = client.list_objects().await.unwrap();
    let _peer = display.await.unwrap();

    // THEN: The result is exposed
    assert!(response.is_ok());
    assert_eq!(response.header, "LIST");
    assert_eq!(response.result(), Some(&json!([{"id": "1", "name": "chair"}])));

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies the CONTROL frame on the wire advertises the exact body byte count.
///
/// **BUG THIS CATCHES**: Would catch the header size drifting from the bytes actually
/// written (for example a trailing newline appended after the size was computed).
#[tokio::test]
async fn given_control_command_when_sent_then_peer_reads_exact_body() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let expected_body =
        r#"{"object_id": "123", "action": "next", "action_parameters": {"operation": "next"}}"#;

    // WHEN: Sending the reference CONTROL command
    let display = tokio::spawn(async move {
        let frame = peer.read_frame().await;
        peer.reply_ok("CONTROL").await;
        (peer, frame)
    });
    let response = client
        .control("123", "next", object(json!({"operation": "next"})))
        .await
        .unwrap();
    let (mut peer, frame) = display.await.unwrap();

    // THEN: Header `CONTROL <N>` and exactly N body bytes, nothing trailing
    assert!(response.is_ok());
    assert_eq!(frame.name, "CONTROL");
    assert_eq!(frame.body_size, expected_body.len());
    assert_eq!(frame.raw_body, expected_body);
    assert!(peer.stays_silent(Duration::from_millis(100)).await);

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies responses are read whether or not the body ends with a newline.
///
/// **WHY THIS MATTERS**: The wire grammar is `<STATUS_HEADER>\n<json_body>` with nothing
/// after the body. A display that writes exactly that, or ends lines with CRLF, must get
/// the same treatment as one that appends `\n`.
///
/// **BUG THIS CATCHES**: Would catch the body being read as a line, which leaves every
/// caller (and every PING) waiting for a newline that never comes.
#[tokio::test]
async fn given_body_without_trailing_newline_when_command_sent_then_response_returned() {
    // GIVEN: A display that answers once with a bare body and once with CRLF
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();

    let display = tokio::spawn(async move {
        peer.read_frame().await;
        peer.reply_raw("LIST\n{\"status_message\": \"OK\", \"result\": []}")
            .await;
        peer.read_frame().await;
        peer.reply_raw("GET_MODEL\r\n{\"status_message\": \"OK\", \"result\": \"lamp\"}\r\n")
            .await;
        peer
    });

    // WHEN: Sending two commands on the same connection
    let listed = tokio::time::timeout(STEP_TIMEOUT, client.list_objects())
        .await
        .expect("a bare body must complete the response")
        .unwrap();
    let model = tokio::time::timeout(STEP_TIMEOUT, client.get_model())
        .await
        .expect("a CRLF body must complete the response")
        .unwrap();
    let _peer = display.await.unwrap();

    // THEN: Both parse and stay paired with their requests
    assert!(listed.is_ok());
    assert_eq!(listed.result(), Some(&json!([])));
    assert!(model.is_ok());
    assert_eq!(model.result(), Some(&json!("lamp")));
    assert!(client.is_connected());

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a malformed response surfaces as an ERROR result and the channel
/// keeps working.
///
/// **BUG THIS CATCHES**: Would catch a JSON decode failure being propagated as a panic or
/// dropping the connection.
#[tokio::test]
async fn given_malformed_response_when_command_sent_then_error_result_and_channel_usable() {
    // GIVEN: A connected display that answers garbage once, then properly
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();

    let display = tokio::spawn(async move {
        peer.read_frame().await;
        peer.reply_raw("GET_MODEL\n{not json\n").await;
        peer.read_frame().await;
        peer.reply("GET_MODEL", json!({"status_message": "OK", "result": "chair"}))
            .await;
        peer
    });

    // WHEN: Sending GET_MODEL twice
    let garbled = client.get_model().await.unwrap();
    let healthy = client.get_model().await.unwrap();
    let _peer = display.await.unwrap();

    // THEN: First is an ERROR result, second succeeds on the same connection
    assert!(!garbled.is_ok());
    assert!(garbled.error_message().is_some());
    assert!(healthy.is_ok());
    assert_eq!(healthy.result(), Some(&json!("chair")));
    assert!(client.is_connected());

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies that a display vanishing mid-command yields an ERROR result, the
/// channel goes DISCONNECTED, and the supervisor listens again.
///
/// **WHY THIS MATTERS**: "Unity was closed" must turn into "waiting for reconnection",
/// never into a crash or a caller stuck forever.
///
/// **BUG THIS CATCHES**: Would catch EOF being treated as an empty response, or the dead
/// socket being kept as the live peer.
#[tokio::test]
async fn given_peer_closes_mid_command_when_send_command_then_error_and_reconnect_possible() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let mut states = supervisor.subscribe();
    assert_eq!(*states.borrow(), ConnectionState::Connected);

    // WHEN: The display reads the request and closes without answering
    let display = tokio::spawn(async move {
        peer.read_frame().await;
        drop(peer);
    });
    let response = client.next().await.unwrap();
    display.await.unwrap();

    // THEN: ERROR result, back to listening, a new display can connect
    assert!(!response.is_ok());
    assert!(wait_for_state(&mut states, ConnectionState::Listening).await);
    assert!(!client.is_connected());

    let _second = connect_peer(&supervisor, address).await;
    assert!(client.is_connected());

    supervisor.stop().await.unwrap();
}

// ============================================================================
// Validation errors
// ============================================================================

/// **VALUE**: Verifies that a half-built command is a typed error and nothing is sent.
///
/// **BUG THIS CATCHES**: Would catch validation happening after the header was written,
/// which would leave the display waiting for a body that never comes.
#[tokio::test]
async fn given_incomplete_command_when_sent_then_missing_field_and_wire_silent() {
    // GIVEN: A connected display
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();

    // WHEN: Sending CONTROL without parameters
    let result = client
        .send_command(&Command::Control(
            ControlCommand::default()
                .with_object_id("9")
                .with_action("rotate"),
        ))
        .await;

    // THEN: MissingField, nothing on the wire, still connected
    assert!(matches!(
        result,
        Err(CommandError::MissingField {
            field: "action_parameters",
            ..
        })
    ));
    assert!(peer.stays_silent(Duration::from_millis(150)).await);
    assert!(client.is_connected());

    supervisor.stop().await.unwrap();
}

// ============================================================================
// Concurrency
// ============================================================================

/// **VALUE**: Verifies concurrent callers each get their own response.
///
/// **WHY THIS MATTERS**: Responses carry no request id. The UI and the agent may both issue
/// commands at once; without the channel lock their frames interleave and each gets the
/// other's answer.
///
/// **BUG THIS CATCHES**: Would catch removal of the single-writer lock or holding it only
/// for the write half of the round trip.
#[tokio::test]
async fn given_concurrent_callers_when_commands_sent_then_each_gets_matching_response() {
    // GIVEN: A display echoing the command name as its result
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let display = tokio::spawn(async move {
        for _ in 0..4 {
            let frame = peer.read_frame().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            peer.reply(
                &frame.name,
                json!({"status_message": "OK", "result": frame.name}),
            )
            .await;
        }
        peer
    });

    // WHEN: Four callers race
    let (a, b, c, d) = (
        supervisor.client(),
        supervisor.client(),
        supervisor.client(),
        supervisor.client(),
    );
    let (list, model, next, previous) =
        tokio::join!(a.list_objects(), b.get_model(), c.next(), d.previous());
    let _peer = display.await.unwrap();

    // THEN: Every caller sees the answer to its own command
    assert_eq!(list.unwrap().result(), Some(&json!("LIST")));
    assert_eq!(model.unwrap().result(), Some(&json!("GET_MODEL")));
    assert_eq!(next.unwrap().result(), Some(&json!("NEXT")));
    assert_eq!(previous.unwrap().result(), Some(&json!("PREVIOUS")));

    supervisor.stop().await.unwrap();
}
