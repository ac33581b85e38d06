//! Drives the operator console with in-memory input against a real
//! supervisor, with and without a display attached.

use display_control::console::run;

use control_core::channel::{ChannelSupervisor, ConnectionState, NO_PEER_MESSAGE};
use control_core::config::ChannelConfig;

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn local_config() -> ChannelConfig {
    ChannelConfig {
        host: String::from("127.0.0.1"),
        port: 0,
        accept_timeout_ms: 50,
        ping_interval_ms: 60_000,
        ..ChannelConfig::default()
    }
}

/// Queue every line of `input`, then close the channel as end of input would.
fn typed(input: &str) -> mpsc::Receiver<String> {
    let lines: Vec<&str> = input.lines().collect();
    let (sender, receiver) = mpsc::channel(lines.len().max(1));
    for line in lines {
        sender.try_send(line.to_string()).unwrap();
    }
    receiver
}

async fn run_console(supervisor: &ChannelSupervisor, input: &str) -> Vec<String> {
    let client = supervisor.client();
    let mut output = Vec::new();
    timeout(STEP_TIMEOUT, run(&client, typed(input), &mut output))
        .await
        .expect("console should finish")
        .expect("console should not fail on in-memory I/O");
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// **VALUE**: With no display attached every command prints an ERROR body.
///
/// **WHY THIS MATTERS**: The operator must see that the display is absent,
/// and the console must keep accepting input.
///
/// **BUG THIS CATCHES**: Would catch the console exiting or hanging on the
/// first failed command.
#[tokio::test]
async fn given_no_display_when_commands_entered_then_each_prints_error() {
    // GIVEN: A supervisor that was never started
    let supervisor = ChannelSupervisor::new(local_config());

    // WHEN: Two commands and a blank line are entered
    let lines = run_console(&supervisor, "list\n\nnext\n").await;

    // THEN: One ERROR line per command
    assert_eq!(lines.len(), 2, "output: {lines:?}");
    for line in &lines {
        let body: Value = serde_json::from_str(line).unwrap();
        assert_eq!(body["status_message"], "ERROR");
        assert_eq!(body["error_message"], NO_PEER_MESSAGE);
    }
}

/// **VALUE**: `quit` ends the loop before later lines run.
#[tokio::test]
async fn given_quit_when_more_lines_follow_then_they_are_ignored() {
    // GIVEN: An idle supervisor
    let supervisor = ChannelSupervisor::new(local_config());

    // WHEN: status, quit, then another command
    let lines = run_console(&supervisor, "status\nquit\nlist\n").await;

    // THEN: Only the status line is printed
    assert_eq!(lines.len(), 1, "output: {lines:?}");
    let status: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(status["state"], ConnectionState::Disconnected.to_string());
    assert_eq!(status["peer"], Value::Null);
}

/// **VALUE**: A typo prints an error line and the next command still runs.
///
/// **BUG THIS CATCHES**: Would catch parse errors being propagated out of
/// the loop.
#[tokio::test]
async fn given_bad_line_when_entered_then_error_printed_and_loop_continues() {
    // GIVEN: An idle supervisor
    let supervisor = ChannelSupervisor::new(local_config());

    // WHEN: An unknown verb, then a valid command
    let lines = run_console(&supervisor, "frobnicate\nping\n").await;

    // THEN: An `error:` line, then the ERROR body for ping
    assert_eq!(lines.len(), 2, "output: {lines:?}");
    assert!(lines[0].starts_with("error: unknown command `frobnicate`"));
    assert!(lines[1].contains(NO_PEER_MESSAGE));
}

/// **VALUE**: With a display attached, the console prints the display's reply.
///
/// **BUG THIS CATCHES**: Would catch the console printing the wrong part of
/// the response or the request frame being malformed.
#[tokio::test]
async fn given_connected_display_when_list_entered_then_reply_body_printed() {
    // GIVEN: A running supervisor with a display connected
    let supervisor = ChannelSupervisor::new(local_config());
    supervisor.start().await;
    let address = supervisor.local_addr().await.expect("listening");
    let mut states = supervisor.subscribe();
    let stream = TcpStream::connect(address).await.unwrap();
    timeout(
        STEP_TIMEOUT,
        states.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .expect("peer should be accepted")
    .unwrap();

    // AND: The display answers one LIST
    let display = tokio::spawn(async move {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut header = String::new();
        reader.read_line(&mut header).await.unwrap();
        let (name, size) = header.trim_end().split_once(' ').unwrap();
        let mut body = vec![0u8; size.parse().unwrap()];
        reader.read_exact(&mut body).await.unwrap();

        let reply = r#"{"status_message": "OK", "result": ["chair", "lamp"]}"#;
        write_half
            .write_all(format!("LIST\n{reply}\n").as_bytes())
            .await
            .unwrap();
        (name.to_string(), String::from_utf8(body).unwrap())
    });

    // WHEN: The operator types list
    let lines = run_console(&supervisor, "list\n").await;

    // THEN: The display saw LIST with an empty body
    let (name, body) = display.await.unwrap();
    assert_eq!(name, "LIST");
    assert_eq!(body, "{}");

    // AND: The console printed the reply body
    assert_eq!(lines.len(), 1, "output: {lines:?}");
    let printed: Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(printed["status_message"], "OK");
    assert_eq!(printed["result"][1], "lamp");

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a console still waiting for input does not hold up shutdown.
///
/// **WHY THIS MATTERS**: After Ctrl-C the operator has typed nothing, so the console is
/// parked on input. Dropping the runtime must not wait for another line.
///
/// **BUG THIS CATCHES**: Would catch console input being read through the runtime's
/// blocking pool, whose uncancellable read keeps runtime drop waiting for Enter.
#[test]
fn given_console_waiting_for_input_when_runtime_dropped_then_shutdown_is_prompt() {
    // GIVEN: A console task whose input is open but silent
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let supervisor = ChannelSupervisor::new(local_config());
    let client = supervisor.client();
    let (sender, receiver) = mpsc::channel::<String>(1);
    runtime.spawn(async move {
        let mut output = tokio::io::sink();
        let _ = run(&client, receiver, &mut output).await;
    });

    // WHEN: Dropping the runtime
    let started = Instant::now();
    drop(runtime);

    // THEN: It returns without waiting on input
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "runtime drop waited {:?}",
        started.elapsed()
    );
    drop(sender);
}
