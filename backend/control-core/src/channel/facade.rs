//! Calling facade used by object management, file management and agent tools.
//!
//! Callers hand in a [`Command`] and get a [`Response`] back. Transport and
//! protocol failures come back as `ERROR` responses, so nothing above this
//! layer needs to know about sockets. Only a command that was built wrong
//! surfaces as an `Err`.

use crate::channel::connection_channel::ConnectionChannel;
use crate::channel::state::ConnectionState;
use crate::command::{Command, TransferCommand};
use crate::error::channel::ChannelError;
use crate::error::command::CommandError;
use crate::response::Response;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Cloneable handle for issuing commands to the display.
///
/// All clones share one channel; concurrent callers are served one at a
/// time in lock order.
#[derive(Clone)]
pub struct DisplayClient {
    channel: Arc<ConnectionChannel>,
}

impl DisplayClient {
    pub fn new(channel: Arc<ConnectionChannel>) -> Self {
        Self { channel }
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn peer_address(&self) -> Option<SocketAddr> {
        self.channel.peer_address()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.channel.subscribe()
    }

    /// Issue one command; TRANSFER commands go through the file path.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] only for a command that cannot be serialized
    /// (missing field, missing file). Everything else is an `ERROR` response.
    pub async fn send_command(&self, command: &Command) -> Result<Response, CommandError> {
        let result = match command {
            Command::Transfer(transfer) => self.channel.send_file(transfer).await,
            other => self.channel.send_command(other).await,
        };
        normalize(command.name(), result)
    }

    /// Upload a file to the display.
    ///
    /// # Errors
    ///
    /// See [`Self::send_command`].
    pub async fn send_file(&self, transfer: &TransferCommand) -> Result<Response, CommandError> {
        normalize("TRANSFER", self.channel.send_file(transfer).await)
    }

    pub async fn ping(&self) -> Result<Response, CommandError> {
        self.send_command(&Command::Ping).await
    }

    pub async fn list_objects(&self) -> Result<Response, CommandError> {
        self.send_command(&Command::List).await
    }

    pub async fn get_model(&self) -> Result<Response, CommandError> {
        self.send_command(&Command::GetModel).await
    }

    pub async fn next(&self) -> Result<Response, CommandError> {
        self.send_command(&Command::Next).await
    }

    pub async fn previous(&self) -> Result<Response, CommandError> {
        self.send_command(&Command::Previous).await
    }

    pub async fn control(
        &self,
        object_id: impl Into<String>,
        action: impl Into<String>,
        action_parameters: Map<String, Value>,
    ) -> Result<Response, CommandError> {
        self.send_command(&Command::control(object_id, action, action_parameters))
            .await
    }

    pub async fn delete_object(&self, object_id: impl Into<String>) -> Result<Response, CommandError> {
        self.send_command(&Command::delete(object_id)).await
    }

    pub async fn update_object(&self, file_name: impl Into<String>) -> Result<Response, CommandError> {
        self.send_command(&Command::update(file_name)).await
    }

    pub async fn transfer_file(&self, file_path: impl Into<PathBuf>) -> Result<Response, CommandError> {
        self.send_file(&TransferCommand::new(file_path)).await
    }
}

fn normalize(name: &str, result: Result<Response, ChannelError>) -> Result<Response, CommandError> {
    match result {
        Ok(response) => Ok(response),
        Err(ChannelError::Command(error)) => Err(error),
        Err(ChannelError::TransferRejected { response, .. }) => Ok(*response),
        Err(error) => {
            warn!("{name} failed: {error}");
            Ok(Response::error(error.summary()))
        }
    }
}
