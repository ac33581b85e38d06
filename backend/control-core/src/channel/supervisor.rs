//! Background owner of the listening socket and the peer lifecycle.
//!
//! The supervisor task alternates between two loops:
//!
//! 1. **Accept**: wait for the display with a short timeout so a stop
//!    request is noticed promptly.
//! 2. **Monitor**: while a display is connected, PING it every
//!    `ping_interval` and refuse any second peer. After `max_missed_pings`
//!    consecutive misses the peer is dropped and the task goes back to (1).
//!
//! A display that crashes or is closed therefore turns into a quiet wait for
//! it to reconnect, never into a failure of the control application.

use crate::channel::connection_channel::ConnectionChannel;
use crate::channel::facade::DisplayClient;
use crate::channel::state::ConnectionState;
use crate::config::ChannelConfig;
use crate::error::supervisor::SupervisorError;

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tokio::spawn as TokioSpawn;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep as TokioSleep, timeout as TokioTimeout};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(150);
const MONITOR_TICK: Duration = Duration::from_millis(100);

/// Start/stop lifecycle for the control channel.
///
/// Build one per process and hand out [`DisplayClient`]s to everything that
/// needs to talk to the display.
pub struct ChannelSupervisor {
    config: ChannelConfig,
    channel: Arc<ConnectionChannel>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    local_addr: RwLock<Option<SocketAddr>>,
}

impl ChannelSupervisor {
    pub fn new(config: ChannelConfig) -> Self {
        let channel = Arc::new(ConnectionChannel::new(&config));
        Self {
            config,
            channel,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            local_addr: RwLock::new(None),
        }
    }

    /// Calling facade sharing this supervisor's channel.
    pub fn client(&self) -> DisplayClient {
        DisplayClient::new(Arc::clone(&self.channel))
    }

    pub fn channel(&self) -> &Arc<ConnectionChannel> {
        &self.channel
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.channel.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to, if it is.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    /// Bind the listener and launch the accept loop.
    ///
    /// A bind failure is logged and swallowed: the application keeps running
    /// with no display connected and every command answers
    /// `"no peer connected"`. Calling `start` while running is a no-op.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("Control channel already running");
            return;
        }

        let listener = match bind_listener(&self.config).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Control channel unavailable, continuing without a display: {e}");
                return;
            }
        };

        let bound = listener.local_addr().ok();
        *self.local_addr.write().await = bound;

        self.running.store(true, Ordering::SeqCst);
        self.channel.set_state(ConnectionState::Listening);
        info!(
            "Control channel listening on {}",
            bound.map_or_else(|| self.config.address(), |addr| addr.to_string())
        );

        *task = Some(TokioSpawn(supervise(
            listener,
            Arc::clone(&self.channel),
            Arc::clone(&self.running),
            self.config.clone(),
        )));
    }

    /// Stop the accept loop, notify and drop the peer, release the listener.
    ///
    /// A caller blocked on a round trip is interrupted with an `ERROR`
    /// result; the peer socket is closed either way.
    ///
    /// Waits at most `join_timeout` for the background task; a task that
    /// does not finish in time is aborted, so the listener is always closed
    /// when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Join`] if the background task panicked.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let Some(mut handle) = self.task.lock().await.take() else {
            debug!("Control channel not running, nothing to stop");
            return Ok(());
        };

        info!("Stopping control channel");
        self.running.store(false, Ordering::SeqCst);

        let join_timeout = self.config.join_timeout();
        self.channel.notify_shutdown(join_timeout).await;
        self.channel.close().await;

        let joined = match TokioTimeout(join_timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SupervisorError::Join {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(_) => {
                warn!(
                    "Control channel task did not stop within {:?}, aborting",
                    join_timeout
                );
                handle.abort();
                let _ = handle.await;
                Ok(())
            }
        };

        *self.local_addr.write().await = None;
        self.channel.set_state(ConnectionState::Disconnected);
        info!("Control channel stopped");
        joined
    }
}

async fn bind_listener(config: &ChannelConfig) -> Result<TcpListener, SupervisorError> {
    let address = config.address();
    let bind_error = |source: std::io::Error| SupervisorError::Bind {
        address: address.clone(),
        location: ErrorLocation::from(Location::caller()),
        source,
    };

    let socket_addr = lookup_host(&address)
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ))
        })?;

    let socket = if socket_addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;

    socket.set_reuseaddr(true).map_err(bind_error)?;
    socket.bind(socket_addr).map_err(bind_error)?;
    socket.listen(config.backlog).map_err(bind_error)
}

async fn supervise(
    listener: TcpListener,
    channel: Arc<ConnectionChannel>,
    running: Arc<AtomicBool>,
    config: ChannelConfig,
) {
    while running.load(Ordering::SeqCst) {
        match channel.accept(&listener, config.accept_timeout()).await {
            Ok(None) => continue,
            Ok(Some(_)) => {
                monitor_peer(&listener, &channel, &running, &config).await;
                if running.load(Ordering::SeqCst) {
                    channel.set_state(ConnectionState::Listening);
                    info!("Waiting for the display to reconnect");
                }
            }
            Err(e) => {
                warn!("Accept failed: {e}");
                TokioSleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    debug!("Control channel accept loop finished");
}

/// Liveness loop for the connected peer; returns once it is gone or on stop.
async fn monitor_peer(
    listener: &TcpListener,
    channel: &ConnectionChannel,
    running: &AtomicBool,
    config: &ChannelConfig,
) {
    let mut ticker = interval(MONITOR_TICK.min(config.ping_interval()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_poll = Instant::now();
    let mut missed = 0u32;

    while running.load(Ordering::SeqCst) && channel.is_connected() {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, address)) => refuse_peer(stream, address, channel),
                Err(e) => warn!("Accept failed while connected: {e}"),
            },
            _ = ticker.tick() => {}
        }

        if !running.load(Ordering::SeqCst) || !channel.is_connected() {
            break;
        }
        if last_poll.elapsed() < config.ping_interval() {
            continue;
        }
        last_poll = Instant::now();

        match channel.is_alive().await {
            Ok(true) => {
                if missed > 0 {
                    info!("Display answered again after {missed} missed ping(s)");
                }
                missed = 0;
            }
            Ok(false) => {
                missed += 1;
                warn!(
                    "Display missed ping {missed}/{}",
                    config.max_missed_pings
                );
                if missed >= config.max_missed_pings {
                    warn!("Display unresponsive, dropping connection");
                    channel.close().await;
                    break;
                }
            }
            Err(e) => {
                warn!("Liveness check failed: {}", e.summary());
                if channel.is_connected() {
                    channel.close().await;
                }
                break;
            }
        }
    }
}

fn refuse_peer(stream: TcpStream, address: SocketAddr, channel: &ConnectionChannel) {
    match channel.peer_address() {
        Some(current) => warn!("Refused {address}: display {current} is already connected"),
        None => warn!("Refused {address}: a display is already connected"),
    }
    drop(stream);
}
