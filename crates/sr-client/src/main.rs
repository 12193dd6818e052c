//! screen-relay client
//!
//! Connects to a relay and either runs an interactive command shell or
//! stays connected printing relayed messages until interrupted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sr_client::output::{
    describe_message, help_text, print_error, print_info, print_success, print_warning,
};
use sr_client::shell::ShellCommand;
use sr_client::{ClientSession, RelayConnector};
use sr_core::config::{self, ClientConfig};
use sr_core::time::current_time_millis;

#[derive(Parser)]
#[command(name = "sr-client")]
#[command(about = "screen-relay client")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Relay host (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Relay TCP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Read commands from stdin
    #[arg(short, long)]
    interactive: bool,

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
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_client_config_path);
    let mut config = if args.config.is_some() || config_path.exists() {
        config::load_or_default::<ClientConfig>(&config_path)
    } else {
        ClientConfig::default()
    };

    if let Some(server) = args.server {
        config.server_host = server;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }
    let config = config.normalized();

    let connector = RelayConnector::new(config);
    let mut session = match connector.connect().await {
        Ok(session) => session,
        Err(e) => {
            print_error(&format!("Could not connect to relay: {}", e));
            return Err(e).context("Failed to connect to relay");
        }
    };
    print_success(&format!(
        "Connected to relay at {}",
        connector.config().server_address()
    ));

    if args.interactive {
        run_shell(&mut session, connector.config()).await?;
    } else {
        run_until_closed(&mut session).await;
    }

    if session.is_connected() {
        session.disconnect().await;
    }
    print_info("Disconnected");
    Ok(())
}

/// Print relayed messages until the relay goes away or Ctrl+C
async fn run_until_closed(session: &mut ClientSession) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, disconnecting...");
                break;
            }
            msg = session.recv() => match msg {
                Some(msg) => print_info(&describe_message(&msg)),
                None => {
                    print_warning("Relay closed the session");
                    break;
                }
            }
        }
    }
}

/// Interactive command loop over stdin
async fn run_shell(session: &mut ClientSession, config: &ClientConfig) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", help_text());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };

                match ShellCommand::parse(&line) {
                    ShellCommand::Start => report(session.start_share().await, "Started sharing"),
                    ShellCommand::Stop => report(session.stop_share().await, "Stopped sharing"),
                    ShellCommand::Test => {
                        let payload = format!("Test screen data {}", current_time_millis());
                        report(
                            session.send_screen_data(payload.into_bytes()).await,
                            "Sent test screen data",
                        );
                    }
                    ShellCommand::Status => {
                        println!("Relay:      {}", config.server_address());
                        println!("Datagram:   {}", config.udp_address());
                        println!("State:      {}", session.state());
                        println!("Local id:   {}", session.local_id());
                        println!(
                            "Session id: {}",
                            session.assigned_id().unwrap_or("(not assigned yet)")
                        );
                    }
                    ShellCommand::Help => println!("{}", help_text()),
                    ShellCommand::Quit => break,
                    ShellCommand::Empty => {}
                    ShellCommand::Unknown(cmd) => {
                        print_warning(&format!(
                            "Unknown command: {}. Type 'help' for commands",
                            cmd
                        ));
                    }
                }
            }

            msg = session.recv() => match msg {
                Some(msg) => print_info(&describe_message(&msg)),
                None => {
                    print_warning("Relay closed the session");
                    break;
                }
            }
        }
    }

    Ok(())
}

fn report(sent: bool, success: &str) {
    if sent {
        print_success(success);
    } else {
        print_error("Not connected to relay");
    }
}
