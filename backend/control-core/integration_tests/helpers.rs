//! Test helpers for control channel integration tests.
//!
//! - Starting a supervisor on an ephemeral localhost port
//! - A mock display peer that reads request frames and writes responses
//! - Waiting for connection state transitions

use control_core::channel::{ChannelSupervisor, ConnectionState};
use control_core::config::ChannelConfig;

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::watch;
use tokio::time::timeout;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Fast accept loop, liveness polling effectively off.
pub fn test_config() -> ChannelConfig {
    ChannelConfig {
        host: String::from("127.0.0.1"),
        port: 0,
        backlog: 8,
        accept_timeout_ms: 50,
        ping_interval_ms: 60_000,
        ping_timeout_ms: 200,
        max_missed_pings: 3,
        chunk_size: 1024,
        join_timeout_ms: 2_000,
    }
}

/// Start a supervisor and return it with its bound address.
pub async fn start_supervisor(config: ChannelConfig) -> (ChannelSupervisor, SocketAddr) {
    let supervisor = ChannelSupervisor::new(config);
    supervisor.start().await;
    let address = supervisor
        .local_addr()
        .await
        .expect("supervisor should be listening");
    (supervisor, address)
}

/// Wait until the channel reports `want`.
pub async fn wait_for_state(
    receiver: &mut watch::Receiver<ConnectionState>,
    want: ConnectionState,
) -> bool {
    timeout(STEP_TIMEOUT, receiver.wait_for(|state| *state == want))
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false)
}

/// Connect a mock peer and wait until the supervisor has accepted it.
pub async fn connect_peer(supervisor: &ChannelSupervisor, address: SocketAddr) -> MockPeer {
    let mut states = supervisor.subscribe();
    let peer = MockPeer::connect(address).await;
    assert!(
        wait_for_state(&mut states, ConnectionState::Connected).await,
        "supervisor should accept the peer"
    );
    peer
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Stand-in for the display: reads request frames, writes response frames.
pub struct MockPeer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// One request frame as the display sees it.
#[derive(Debug)]
pub struct ReceivedFrame {
    pub name: String,
    pub body_size: usize,
    pub raw_body: String,
    pub body: Map<String, Value>,
}

impl MockPeer {
    pub async fn connect(address: SocketAddr) -> Self {
        let stream = timeout(STEP_TIMEOUT, TcpStream::connect(address))
            .await
            .expect("connect timed out")
            .expect("Failed to connect to control channel");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read one `NAME SIZE\n<body>` frame.
    pub async fn read_frame(&mut self) -> ReceivedFrame {
        timeout(STEP_TIMEOUT, self.try_read_frame())
            .await
            .expect("no frame within timeout")
            .expect("connection closed before a frame arrived")
    }

    /// `None` when the connection is closed or a bare token arrives.
    pub async fn try_read_frame(&mut self) -> Option<ReceivedFrame> {
        let mut header = String::new();
        let read = self.reader.read_line(&mut header).await.ok()?;
        if read == 0 {
            return None;
        }

        // A bare line such as the quit token has no size and ends the conversation.
        let (name, size) = header.trim_end().split_once(' ')?;
        let body_size: usize = size.parse().expect("size should be numeric");

        let mut body = vec![0u8; body_size];
        self.reader.read_exact(&mut body).await.ok()?;
        let raw_body = String::from_utf8(body).expect("body should be UTF-8");
        let parsed: Map<String, Value> =
            serde_json::from_str(&raw_body).expect("body should be a JSON object");

        Some(ReceivedFrame {
            name: name.to_string(),
            body_size,
            raw_body,
            body: parsed,
        })
    }

    /// Read exactly `count` raw bytes (the file stream of a transfer).
    pub async fn read_raw(&mut self, count: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; count];
        timeout(STEP_TIMEOUT, self.reader.read_exact(&mut bytes))
            .await
            .expect("raw bytes timed out")
            .expect("connection closed during raw read");
        bytes
    }

    /// Everything the channel sends until it closes the connection.
    pub async fn read_to_end(&mut self) -> Vec<u8> {
        let mut bytes = Vec::new();
        timeout(STEP_TIMEOUT, self.reader.read_to_end(&mut bytes))
            .await
            .expect("connection was not closed")
            .expect("read to end failed");
        bytes
    }

    /// True when no byte arrives within `window`.
    pub async fn stays_silent(&mut self, window: Duration) -> bool {
        let mut byte = [0u8; 1];
        match timeout(window, self.reader.read(&mut byte)).await {
            Err(_) => true,
            Ok(Ok(0)) => true,
            Ok(_) => false,
        }
    }

    pub async fn reply(&mut self, header: &str, body: Value) {
        let frame = format!("{header}\n{body}\n");
        self.reply_raw(&frame).await;
    }

    pub async fn reply_ok(&mut self, header: &str) {
        self.reply(header, json!({"status_message": "OK"})).await;
    }

    pub async fn reply_raw(&mut self, frame: &str) {
        self.writer
            .write_all(frame.as_bytes())
            .await
            .expect("Failed to write response");
    }

    /// Answer PINGs with OK until the connection closes; returns how many were answered.
    pub async fn answer_pings(self) -> usize {
        self.answer_pings_ending_with("\n").await
    }

    /// As [`Self::answer_pings`], with `ending` written after each response body.
    pub async fn answer_pings_ending_with(mut self, ending: &str) -> usize {
        let reply = format!("PING\n{{\"status_message\": \"OK\"}}{ending}");
        let mut answered = 0;
        while let Some(frame) = self.try_read_frame().await {
            assert_eq!(frame.name, "PING", "only PINGs expected");
            if self
                .writer
                .write_all(reply.as_bytes())
                .await
                .is_err()
            {
                break;
            }
            answered += 1;
        }
        answered
    }
}
