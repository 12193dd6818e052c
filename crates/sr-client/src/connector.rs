//! Outbound connection to the relay
//!
//! Establishes the TCP connection with a bounded number of attempts and a
//! fixed delay between them.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpStream;

use sr_core::config::ClientConfig;

use crate::retry::FixedRetry;
use crate::session::ClientSession;

/// Errors from connecting to the relay
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A single attempt did not complete in time
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// A single attempt failed at the socket level
    #[error("Connection failed: {0}")]
    Io(#[from] std::io::Error),

    /// Every allowed attempt failed
    #[error("Failed to connect after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: Box<ConnectError>,
    },
}

/// Connects a client to the relay described by its configuration
pub struct RelayConnector {
    config: ClientConfig,
}

impl RelayConnector {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to the relay, retrying with a fixed delay.
    ///
    /// Gives up with [`ConnectError::Exhausted`] after
    /// `reconnect_attempts` failed attempts. No delay follows the last one.
    pub async fn connect(&self) -> Result<ClientSession, ConnectError> {
        let address = self.config.server_address();
        let mut retry = FixedRetry::from_config(&self.config);
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(
                "Connecting to relay at {} (attempt {}/{})",
                address,
                attempt,
                self.config.reconnect_attempts.max(1)
            );

            match self.try_connect(&address).await {
                Ok(stream) => {
                    tracing::info!("Connected to relay at {}", address);
                    return Ok(ClientSession::start(stream, &self.config));
                }
                Err(e) => match retry.next_delay() {
                    Some(delay) => {
                        tracing::warn!("Connection failed: {}. Retrying in {:?}", e, delay);
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            "Giving up on {} after {} attempts in {:?}",
                            address,
                            attempt,
                            started.elapsed()
                        );
                        return Err(ConnectError::Exhausted {
                            attempts: attempt,
                            last_error: Box::new(e),
                        });
                    }
                },
            }
        }
    }

    /// Attempt a single connection
    async fn try_connect(&self, address: &str) -> Result<TcpStream, ConnectError> {
        let timeout = self.config.connect_timeout;
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))??;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(stream)
    }
}
