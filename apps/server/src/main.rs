//! LinkPlay Server - headless multiroom group control for LinkPlay speakers.
//!
//! Probes the configured devices, registers them, and serves the HTTP API
//! for join/unjoin, group volume and per-device commands until a shutdown
//! signal arrives.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use linkplay_core::{bootstrap_services, start_server, AppState};
use tokio::signal;
use tokio::sync::oneshot;

use crate::config::ServerConfig;

/// LinkPlay Server - headless multiroom group control.
#[derive(Parser, Debug)]
#[command(name = "linkplay-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "LINKPLAY_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "LINKPLAY_BIND_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("LinkPlay Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }

    log::info!(
        "Configuration: bind_port={}, devices={}, strict_leader_required={}",
        config.bind_port,
        config.devices.len(),
        config.strict_leader_required
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, &config.devices)
        .await
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let app_state = AppState::new(
        services.dispatcher.clone(),
        services.registry.clone(),
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let port = config.bind_port;
    let server_handle = tokio::spawn(async move {
        let stop = async move {
            let _ = stop_rx.await;
        };
        if let Err(e) = start_server(app_state, port, stop).await {
            log::error!("Server error: {}", e);
        }
    });

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    // Stop accepting requests before the registry goes away
    let _ = stop_tx.send(());
    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    services.shutdown();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
