use crate::error::config::ConfigError;
use crate::{DEFAULT_CONTROL_HOST, DEFAULT_CONTROL_PORT};

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

pub const HOST_ENV_VAR: &str = "DISPLAY_CONTROL_HOST";
pub const PORT_ENV_VAR: &str = "DISPLAY_CONTROL_PORT";

const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Listener, liveness and transfer settings for the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    #[serde(default = "default_accept_timeout_ms")]
    pub accept_timeout_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_max_missed_pings")]
    pub max_missed_pings: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            accept_timeout_ms: default_accept_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            max_missed_pings: default_max_missed_pings(),
            chunk_size: default_chunk_size(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    DEFAULT_CONTROL_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_CONTROL_PORT
}
fn default_backlog() -> u32 {
    1
}
fn default_accept_timeout_ms() -> u64 {
    1_000
}
fn default_ping_interval_ms() -> u64 {
    5_000
}
fn default_ping_timeout_ms() -> u64 {
    3_000
}
fn default_max_missed_pings() -> u32 {
    3
}
fn default_chunk_size() -> usize {
    8_192
}
fn default_join_timeout_ms() -> u64 {
    5_000
}

impl ChannelConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// Apply `DISPLAY_CONTROL_HOST` / `DISPLAY_CONTROL_PORT` overrides.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`. An unparsable port is
    /// ignored with a warning so a typo in the environment never keeps the
    /// channel from starting.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV_VAR).filter(|h| !h.trim().is_empty()) {
            info!("{HOST_ENV_VAR} overrides host: {host}");
            self.host = host.trim().to_string();
        }

        if let Some(raw_port) = lookup(PORT_ENV_VAR) {
            match raw_port.trim().parse::<u16>() {
                Ok(port) => {
                    info!("{PORT_ENV_VAR} overrides port: {port}");
                    self.port = port;
                }
                Err(e) => warn!("Ignoring {PORT_ENV_VAR}={raw_port}: {e}"),
            }
        }
    }

    /// Validate channel settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty host, a zero
    /// duration, zero missed pings, or a chunk size outside 1 B..=16 MiB.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "host cannot be empty".to_string(),
            });
        }

        let durations = [
            ("accept_timeout_ms", self.accept_timeout_ms),
            ("ping_interval_ms", self.ping_interval_ms),
            ("ping_timeout_ms", self.ping_timeout_ms),
            ("join_timeout_ms", self.join_timeout_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("{name} must be greater than zero"),
            });
        }

        if self.max_missed_pings == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "max_missed_pings must be at least 1".to_string(),
            });
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid chunk size: {} (must be 1-{MAX_CHUNK_SIZE})",
                    self.chunk_size
                ),
            });
        }

        Ok(())
    }
}
