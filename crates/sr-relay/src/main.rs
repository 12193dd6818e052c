//! screen-relay server daemon
//!
//! Accepts client sessions and relays share notifications and screen data
//! between them until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sr_core::config::{self, RelayConfig};
use sr_relay::{RelayHandle, RelayServer};

#[derive(Parser)]
#[command(name = "sr-relay")]
#[command(about = "screen-relay server daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// TCP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("screen-relay server starting...");

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_relay_config_path);
    let mut config = if args.config.is_some() || config_path.exists() {
        config::load_or_default::<RelayConfig>(&config_path)
    } else {
        tracing::info!("Using default configuration");
        RelayConfig::default()
    };

    if let Some(host) = args.bind {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let config = config.normalized();
    config.log_summary();

    let server = RelayServer::bind(config)
        .await
        .context("Failed to start relay")?;

    tokio::spawn(wait_for_signal(server.handle()));

    server.run().await.context("Relay failed")?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}

/// Trigger graceful shutdown on Ctrl+C or SIGTERM
async fn wait_for_signal(handle: RelayHandle) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }

    handle.shutdown();
}
