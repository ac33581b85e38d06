use crate::helpers::{connect_peer, start_supervisor, test_config};

use control_core::command::Command;
use control_core::error::command::CommandError;

use std::io::Write;
use std::time::Duration;

use serde_json::json;
use tempfile::NamedTempFile;

fn model_file(size: usize) -> (NamedTempFile, Vec<u8>) {
    let contents: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
    let mut file = tempfile::Builder::new()
        .prefix("model-")
        .suffix(".glb")
        .tempfile()
        .expect("temp file");
    file.write_all(&contents).expect("write temp file");
    file.flush().expect("flush temp file");
    (file, contents)
}

/// **VALUE**: Verifies the full two-phase transfer: metadata, ACK, exactly `file_size`
/// raw bytes, then the confirming response as the result.
///
/// **WHY THIS MATTERS**: The display allocates and reads exactly the announced size. One
/// byte too many desyncs the next frame; one too few hangs the display.
///
/// **BUG THIS CATCHES**: Would catch chunk framing being added to the stream, the final
/// response not being awaited, or the ACK response being returned as the result.
#[tokio::test]
async fn given_10000_byte_file_when_transferred_then_peer_receives_exact_bytes() {
    // GIVEN: A connected display and a 10 000 byte file (not a multiple of the chunk size)
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let (file, contents) = model_file(10_000);
    let expected_name = file
        .path()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();

    // WHEN: Transferring while the display runs its side of the handshake
    let display = tokio::spawn(async move {
        let metadata = peer.read_frame().await;
        peer.reply_ok("TRANSFER").await;
        let size = metadata.body["file_size"].as_u64().unwrap() as usize;
        let received = peer.read_raw(size).await;
        let silent_before_confirm = peer.stays_silent(Duration::from_millis(100)).await;
        peer.reply(
            "TRANSFER",
            json!({"status_message": "OK", "result": "stored"}),
        )
        .await;
        (peer, metadata, received, silent_before_confirm)
    });
    let response = client
        .send_command(&Command::transfer(file.path()))
        .await
        .unwrap();
    let (_peer, metadata, received, silent_before_confirm) = display.await.unwrap();

    // THEN: Metadata announced name and size, exactly the file bytes arrived, final
    // response is the result
    assert_eq!(metadata.name, "TRANSFER");
    assert_eq!(metadata.body["file_name"], json!(expected_name));
    assert_eq!(metadata.body["file_size"], json!(10_000));
    assert_eq!(received.len(), 10_000);
    assert_eq!(received, contents);
    assert!(silent_before_confirm, "nothing may follow the file bytes");
    assert!(response.is_ok());
    assert_eq!(response.result(), Some(&json!("stored")));

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a refused metadata phase aborts before any file byte is sent and
/// leaves the connection usable.
///
/// **BUG THIS CATCHES**: Would catch streaming regardless of the ACK, which would make the
/// display parse model bytes as command frames.
#[tokio::test]
async fn given_peer_rejects_metadata_when_transfer_then_no_bytes_streamed() {
    // GIVEN: A display that refuses the transfer
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let (file, _) = model_file(4_096);

    let display = tokio::spawn(async move {
        peer.read_frame().await;
        peer.reply(
            "TRANSFER",
            json!({"status_message": "ERROR", "error_message": "disk full"}),
        )
        .await;
        let silent = peer.stays_silent(Duration::from_millis(200)).await;

        let ping = peer.read_frame().await;
        peer.reply_ok("PING").await;
        (peer, silent, ping.name)
    });

    // WHEN: Transferring, then pinging on the same connection
    let refused = client.transfer_file(file.path()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let ping = client.ping().await.unwrap();
    let (_peer, silent, ping_name) = display.await.unwrap();

    // THEN: The display's refusal is the result and no raw bytes were sent
    assert!(!refused.is_ok());
    assert_eq!(refused.error_message(), Some("disk full"));
    assert!(silent, "file bytes must not follow a refused metadata frame");
    assert_eq!(ping_name, "PING");
    assert!(ping.is_ok());

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies a transfer of a missing file fails locally with nothing on the wire.
///
/// **BUG THIS CATCHES**: Would catch sending a metadata frame for a file that cannot be read.
#[tokio::test]
async fn given_missing_file_when_transfer_then_file_not_found_and_wire_silent() {
    // GIVEN: A connected display and a path that does not exist
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let dir = tempfile::tempdir().unwrap();

    // WHEN: Transferring it
    let result = client.transfer_file(dir.path().join("gone.glb")).await;

    // THEN: FileNotFound, display saw nothing
    assert!(matches!(result, Err(CommandError::FileNotFound { .. })));
    assert!(peer.stays_silent(Duration::from_millis(150)).await);

    supervisor.stop().await.unwrap();
}

/// **VALUE**: Verifies an empty file still completes the handshake with zero raw bytes.
#[tokio::test]
async fn given_empty_file_when_transferred_then_handshake_completes() {
    let (supervisor, address) = start_supervisor(test_config()).await;
    let mut peer = connect_peer(&supervisor, address).await;
    let client = supervisor.client();
    let (file, _) = model_file(0);

    let display = tokio::spawn(async move {
        let metadata = peer.read_frame().await;
        peer.reply_ok("TRANSFER").await;
        peer.reply_ok("TRANSFER").await;
        metadata
    });
    let response = client.transfer_file(file.path()).await.unwrap();
    let metadata = display.await.unwrap();

    assert_eq!(metadata.body["file_size"], json!(0));
    assert!(response.is_ok());

    supervisor.stop().await.unwrap();
}
