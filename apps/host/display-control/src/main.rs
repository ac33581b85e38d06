use display_control::console;
use display_control::error::DisplayControlError;
use display_control::logger::initialize as LoggerInitialize;

use control_core::channel::{ChannelSupervisor, ConnectionState};
use control_core::config::{AppConfig, default_config_dir};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info, warn};
use tokio::io::stdout;

const APP_DIR_NAME: &str = "display-control";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), DisplayControlError> {
    let log_dir = log_dir();

    create_dir_all(&log_dir).map_err(|e| DisplayControlError::App {
        message: format!("Failed to create log directory {}: {e}", log_dir.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Logger before anything that logs
    LoggerInitialize(&log_dir)?;

    info!("Display control starting");
    info!("Log directory: {}", log_dir.display());

    if let Err(e) = dotenvy::dotenv() {
        info!("No .env file loaded: {e}");
    }

    let mut config = match default_config_dir().and_then(|dir| AppConfig::load(&dir)) {
        Ok(config) => config,
        Err(e) => {
            warn!("Falling back to default config: {e}");
            AppConfig::default()
        }
    };
    config
        .channel
        .apply_overrides(|key| std::env::var(key).ok());

    let input = console::stdin_lines()?;

    let supervisor = ChannelSupervisor::new(config.channel);
    supervisor.start().await;

    let mut states = supervisor.subscribe();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state: ConnectionState = *states.borrow_and_update();
            info!("Display channel is {state}");
        }
    });

    let client = supervisor.client();
    let mut output = stdout();

    tokio::select! {
        result = console::run(&client, input, &mut output) => {
            if let Err(e) = result {
                warn!("Console stopped: {e}");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Interrupt received"),
                Err(e) => warn!("Failed to listen for interrupt: {e}"),
            }
        }
    }

    info!("Display control shutting down");
    let stopped = supervisor.stop().await;
    watcher.abort();
    stopped.map_err(|e| DisplayControlError::Core(e.into()))?;

    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join("logs")
}
