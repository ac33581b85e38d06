//! Protocol engine for the single connected peer.

use crate::channel::connection::PeerConnection;
use crate::channel::state::ConnectionState;
use crate::command::{Command, TRANSFER, TransferCommand, encode_body, frame};
use crate::config::ChannelConfig;
use crate::error::channel::ChannelError;
use crate::response::Response;
use crate::SHUTDOWN_TOKEN;

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::timeout as TokioTimeout;

/// Message of the `ERROR` response returned while no peer is connected.
pub const NO_PEER_MESSAGE: &str = "no peer connected";

const INTERRUPT_RETRY: Duration = Duration::from_millis(50);

/// Owns the live peer socket and runs request/response round trips on it.
///
/// The socket sits behind a single-writer async mutex: one command (or one
/// whole transfer, both phases included) holds it from the first byte
/// written to the last byte read. Responses carry no request id, so this
/// lock is what pairs every response with its request.
///
/// State changes are published on a `watch` channel for any number of
/// observers. [`Self::close`] does not wait on a hung round trip: it bumps
/// `interrupt_tx`, which every exchange in flight watches, and the exchange
/// gives the lock up with a `PeerClosed` error.
pub struct ConnectionChannel {
    peer: Mutex<Option<PeerConnection>>,
    state_tx: watch::Sender<ConnectionState>,
    peer_tx: watch::Sender<Option<SocketAddr>>,
    interrupt_tx: watch::Sender<u64>,
    chunk_size: usize,
    ping_timeout: Duration,
}

impl ConnectionChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (peer_tx, _) = watch::channel(None);
        let (interrupt_tx, _) = watch::channel(0);
        Self {
            peer: Mutex::new(None),
            state_tx,
            peer_tx,
            interrupt_tx,
            chunk_size: config.chunk_size,
            ping_timeout: config.ping_timeout(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn peer_address(&self) -> Option<SocketAddr> {
        *self.peer_tx.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            debug!("Control channel is now {next}");
        }
    }

    /// Wait up to `wait` for a peer on `listener`.
    ///
    /// Returns `Ok(None)` when nobody connected in time so the caller can
    /// check for shutdown and try again.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Accept`] if the listener fails
    /// - [`ChannelError::AlreadyConnected`] if a peer is already live; the
    ///   newcomer is dropped
    pub async fn accept(
        &self,
        listener: &TcpListener,
        wait: Duration,
    ) -> Result<Option<SocketAddr>, ChannelError> {
        let (stream, address) = match TokioTimeout(wait, listener.accept()).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) => {
                return Err(ChannelError::Accept {
                    message: e.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Ok(Ok(accepted)) => accepted,
        };

        let mut guard = self.peer.lock().await;
        if let Some(current) = guard.as_ref() {
            return Err(ChannelError::AlreadyConnected {
                current: current.address(),
                refused: address,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        *guard = Some(PeerConnection::new(stream, address));
        drop(guard);

        self.peer_tx.send_replace(Some(address));
        self.set_state(ConnectionState::Connected);
        info!("Display connected from {address}");
        Ok(Some(address))
    }

    /// Send one command and wait for its response.
    ///
    /// Without a peer this returns an `ERROR` response and never touches a
    /// socket. A TRANSFER command is routed through [`Self::send_file`],
    /// since its frame must be followed by the file bytes.
    ///
    /// There is no read timeout: a peer that never answers holds the caller
    /// until the socket is closed.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Command`] if the command fails validation (no I/O done)
    /// - [`ChannelError::Write`], [`ChannelError::Read`],
    ///   [`ChannelError::PeerClosed`] on socket failure; the peer is then dropped
    pub async fn send_command(&self, command: &Command) -> Result<Response, ChannelError> {
        if let Command::Transfer(transfer) = command {
            return self.send_file(transfer).await;
        }

        if !self.is_connected() {
            return Ok(Response::error(NO_PEER_MESSAGE));
        }

        let mut interrupt = self.interrupt_tx.subscribe();
        let mut guard = self.peer.lock().await;
        let Some(peer) = guard.as_mut() else {
            return Ok(Response::error(NO_PEER_MESSAGE));
        };

        let request = command.serialize()?;
        let address = peer.address();
        debug!("Sending {} to {address}", command.name());

        let exchange = async {
            peer.write_frame(&request).await?;
            peer.read_response().await
        };
        let result = tokio::select! {
            result = exchange => result,
            _ = interrupt.changed() => Err(interrupted(address)),
        };

        self.settle(&mut guard, result).await
    }

    /// Upload a file: metadata frame, peer ACK, raw bytes, final response.
    ///
    /// The file is only opened once the peer has answered the metadata
    /// frame with `OK`; any other answer aborts before a single file byte
    /// is read.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Command`] if the path is unset or missing (no I/O done)
    /// - [`ChannelError::TransferRejected`] if the peer refused the metadata
    /// - [`ChannelError::SourceFile`] / [`ChannelError::ShortTransfer`] if the
    ///   file cannot supply the announced bytes
    /// - socket errors as for [`Self::send_command`]
    pub async fn send_file(&self, transfer: &TransferCommand) -> Result<Response, ChannelError> {
        if !self.is_connected() {
            return Ok(Response::error(NO_PEER_MESSAGE));
        }

        let (path, metadata) = transfer.resolve()?;
        let request = frame(TRANSFER, &encode_body(&metadata)?);

        let mut interrupt = self.interrupt_tx.subscribe();
        let mut guard = self.peer.lock().await;
        let Some(peer) = guard.as_mut() else {
            return Ok(Response::error(NO_PEER_MESSAGE));
        };
        let address = peer.address();

        info!(
            "Transferring {} ({} bytes) to {}",
            metadata.file_name,
            metadata.file_size,
            address
        );

        let chunk_size = self.chunk_size;
        let exchange = async {
            peer.write_frame(&request).await?;

            let acknowledgement = peer.read_response().await?;
            if !acknowledgement.is_ok() {
                warn!(
                    "Display refused transfer of {}: {}",
                    metadata.file_name,
                    acknowledgement.error_message().unwrap_or("no reason given")
                );
                return Err(ChannelError::TransferRejected {
                    response: Box::new(acknowledgement),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            let sent = peer.stream_file(path, metadata.file_size, chunk_size).await?;
            debug!("Streamed {sent} bytes of {}", metadata.file_name);

            peer.read_response().await
        };
        let result = tokio::select! {
            result = exchange => result,
            _ = interrupt.changed() => Err(interrupted(address)),
        };

        self.settle(&mut guard, result).await
    }

    /// PING the peer; `Ok(true)` when it answers `OK` within the ping timeout.
    ///
    /// A channel busy with a caller's command counts as alive and is not
    /// pinged. A PING that times out is a miss (`Ok(false)`), and its late
    /// reply is skipped by the next read.
    ///
    /// # Errors
    ///
    /// Socket failures, after which the peer has been dropped.
    pub async fn is_alive(&self) -> Result<bool, ChannelError> {
        let Ok(mut guard) = self.peer.try_lock() else {
            trace!("Channel busy, skipping liveness poll");
            return Ok(true);
        };
        let Some(peer) = guard.as_mut() else {
            return Ok(false);
        };

        let request = Command::Ping.serialize()?;
        let ping_timeout = self.ping_timeout;
        let result = async {
            peer.write_frame(&request).await?;
            match TokioTimeout(ping_timeout, peer.read_response()).await {
                Ok(response) => response.map(|response| response.is_ok()),
                Err(_) => {
                    peer.abandon_reply();
                    Ok(false)
                }
            }
        }
        .await;

        self.settle(&mut guard, result).await
    }

    /// Best-effort notice to the peer that the control side is going away.
    pub async fn notify_shutdown(&self, wait: Duration) {
        let Ok(mut guard) = TokioTimeout(wait, self.peer.lock()).await else {
            warn!("Channel busy, shutdown notice not sent");
            return;
        };
        let Some(peer) = guard.as_mut() else {
            return;
        };

        match TokioTimeout(wait, peer.write_frame(SHUTDOWN_TOKEN.as_bytes())).await {
            Ok(Ok(())) => info!("Sent shutdown notice to {}", peer.address()),
            Ok(Err(e)) => warn!("Failed to send shutdown notice: {}", e.summary()),
            Err(_) => warn!("Timed out sending shutdown notice to {}", peer.address()),
        }
    }

    /// Drop the peer (if any) and go to DISCONNECTED.
    ///
    /// A round trip holding the connection is interrupted rather than
    /// waited for, so this returns even when the peer never answers.
    pub async fn close(&self) {
        let mut guard = self.lock_interrupting().await;
        Self::drop_peer(&mut guard).await;
        drop(guard);
        self.peer_tx.send_replace(None);
        self.set_state(ConnectionState::Disconnected);
    }

    async fn lock_interrupting(&self) -> MutexGuard<'_, Option<PeerConnection>> {
        loop {
            if let Ok(guard) = self.peer.try_lock() {
                return guard;
            }
            // An exchange that subscribed after the last bump misses it, so repeat.
            self.interrupt_tx
                .send_modify(|generation| *generation = generation.wrapping_add(1));
            if let Ok(guard) = TokioTimeout(INTERRUPT_RETRY, self.peer.lock()).await {
                return guard;
            }
        }
    }

    async fn drop_peer(guard: &mut MutexGuard<'_, Option<PeerConnection>>) {
        if let Some(mut peer) = guard.take() {
            peer.shutdown().await;
            info!("Display at {} disconnected", peer.address());
        }
    }

    /// Tear the connection down after any error that may have desynced the stream.
    async fn settle<T>(
        &self,
        guard: &mut MutexGuard<'_, Option<PeerConnection>>,
        result: Result<T, ChannelError>,
    ) -> Result<T, ChannelError> {
        if let Err(error) = &result {
            if error.breaks_connection() {
                warn!("Dropping display connection: {}", error.summary());
                Self::drop_peer(guard).await;
                self.peer_tx.send_replace(None);
                self.set_state(ConnectionState::Disconnected);
            }
        }
        result
    }
}

#[track_caller]
fn interrupted(address: SocketAddr) -> ChannelError {
    ChannelError::PeerClosed {
        message: format!("exchange with {address} interrupted by close"),
        location: ErrorLocation::from(Location::caller()),
    }
}
