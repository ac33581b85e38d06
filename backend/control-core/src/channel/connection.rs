//! Framed I/O over the live peer socket.
//!
//! A response is a header line followed by one JSON value. The body ends
//! where the value closes, so a peer may or may not terminate it with a
//! newline; a body that is not JSON runs to the end of its line.
//!
//! Reads are cancel-safe: partially received input stays in
//! [`PeerConnection`] and the next read picks up where the cancelled one
//! stopped. A reply that was given up on (a timed-out PING) is recorded and
//! skipped before the next response is read, so late answers are never
//! handed to the wrong caller.

use crate::error::channel::ChannelError;
use crate::response::Response;

use common::ErrorLocation;

use std::net::SocketAddr;
use std::path::Path;

use log::{debug, trace, warn};
use serde::de::IgnoredAny;
use serde_json::Deserializer;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub(crate) struct PeerConnection {
    address: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: Vec<u8>,
    body: Vec<u8>,
    header: Option<String>,
    abandoned_replies: usize,
}

impl PeerConnection {
    pub(crate) fn new(stream: TcpStream, address: SocketAddr) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle for {address}: {e}");
        }
        let (reader, writer) = stream.into_split();
        Self {
            address,
            reader: BufReader::new(reader),
            writer,
            line: Vec::new(),
            body: Vec::new(),
            header: None,
            abandoned_replies: 0,
        }
    }

    pub(crate) fn address(&self) -> SocketAddr {
        self.address
    }

    pub(crate) async fn write_frame(&mut self, frame: &[u8]) -> Result<(), ChannelError> {
        trace!("-> {} ({} bytes)", self.address, frame.len());
        self.writer
            .write_all(frame)
            .await
            .map_err(ChannelError::write)?;
        self.writer.flush().await.map_err(ChannelError::write)
    }

    /// Read the next response, skipping replies owed to abandoned requests.
    pub(crate) async fn read_response(&mut self) -> Result<Response, ChannelError> {
        while self.abandoned_replies > 0 {
            let stale = self.read_frame().await?;
            self.abandoned_replies -= 1;
            debug!(
                "Discarded late reply from {}: {}",
                self.address,
                stale.lines().next().unwrap_or_default()
            );
        }

        let raw = self.read_frame().await?;
        Ok(Response::parse(&raw))
    }

    /// Record that the reply to the last request will never be read by its caller.
    pub(crate) fn abandon_reply(&mut self) {
        self.abandoned_replies += 1;
    }

    /// Stream exactly `expected` bytes of `path` with no framing.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::SourceFile`] if the file cannot be opened or read
    /// - [`ChannelError::ShortTransfer`] if the file ends before `expected` bytes
    /// - [`ChannelError::Write`] / [`ChannelError::PeerClosed`] on socket failure
    pub(crate) async fn stream_file(
        &mut self,
        path: &Path,
        expected: u64,
        chunk_size: usize,
    ) -> Result<u64, ChannelError> {
        let file = File::open(path)
            .await
            .map_err(|e| ChannelError::source_file(path, e))?;
        let mut source = file.take(expected);
        let mut chunk = vec![0u8; chunk_size];
        let mut sent = 0u64;

        loop {
            let read = source
                .read(&mut chunk)
                .await
                .map_err(|e| ChannelError::source_file(path, e))?;
            if read == 0 {
                break;
            }
            self.writer
                .write_all(&chunk[..read])
                .await
                .map_err(ChannelError::write)?;
            sent += read as u64;
            trace!("-> {} {sent}/{expected} bytes", self.address);
        }
        self.writer.flush().await.map_err(ChannelError::write)?;

        if sent != expected {
            return Err(ChannelError::ShortTransfer {
                expected,
                sent,
                location: ErrorLocation::here(),
            });
        }
        Ok(sent)
    }

    /// Half-close the write side so the peer sees end-of-stream.
    pub(crate) async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown of {} failed: {e}", self.address);
        }
    }

    async fn read_frame(&mut self) -> Result<String, ChannelError> {
        if self.header.is_none() {
            let header = self.read_header().await?;
            self.header = Some(header);
        }
        let body = self.read_body().await?;
        let header = self.header.take().unwrap_or_default();
        Ok(format!("{header}\n{body}"))
    }

    /// Next non-blank line; blank lines are what a newline- or CRLF-terminated
    /// body leaves behind.
    async fn read_header(&mut self) -> Result<String, ChannelError> {
        loop {
            let line = self.read_line().await?;
            if !line.trim().is_empty() {
                return Ok(line);
            }
        }
    }

    async fn read_line(&mut self) -> Result<String, ChannelError> {
        let read = self
            .reader
            .read_until(b'\n', &mut self.line)
            .await
            .map_err(ChannelError::read)?;

        if read == 0 || !self.line.ends_with(b"\n") {
            return Err(self.closed());
        }

        let line = String::from_utf8_lossy(&self.line)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.line.clear();
        trace!("<- {} {line}", self.address);
        Ok(line)
    }

    /// Read one body, consuming from the socket buffer only the bytes it spans.
    async fn read_body(&mut self) -> Result<String, ChannelError> {
        loop {
            let chunk = self.reader.fill_buf().await.map_err(ChannelError::read)?;
            if chunk.is_empty() {
                return Err(self.closed());
            }

            let available = chunk.len();
            let previous = self.body.len();
            self.body.extend_from_slice(chunk);

            let Some((end, spanned)) = body_end(&self.body) else {
                self.reader.consume(available);
                continue;
            };

            self.reader.consume(spanned.saturating_sub(previous).min(available));
            let body = String::from_utf8_lossy(&self.body[..end]).trim().to_string();
            self.body.clear();
            trace!("<- {} {body}", self.address);
            return Ok(body);
        }
    }

    fn closed(&self) -> ChannelError {
        ChannelError::PeerClosed {
            message: format!("{} closed the connection", self.address),
            location: ErrorLocation::here(),
        }
    }
}

/// Where the body in `buffer` ends: `(body_end, bytes_spanned)`, or `None`
/// while more input is needed.
///
/// A JSON value ends where it closes. Anything else ends at the next
/// newline, which is consumed with it.
fn body_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.iter().position(|byte| !byte.is_ascii_whitespace())?;
    let mut values = Deserializer::from_slice(&buffer[start..]).into_iter::<IgnoredAny>();

    match values.next() {
        Some(Ok(_)) => {
            let end = start + values.byte_offset();
            Some((end, end))
        }
        Some(Err(e)) if e.is_eof() => None,
        _ => buffer
            .iter()
            .position(|&byte| byte == b'\n')
            .map(|newline| (newline, newline + 1)),
    }
}
