//! Datagram side channel
//!
//! The relay keeps a UDP socket bound for its whole lifetime. No payload
//! format is defined for it, so incoming datagrams are read and dropped.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;

/// Largest datagram read in one call
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Bound UDP socket owned by the relay
pub struct DatagramChannel {
    socket: UdpSocket,
}

impl DatagramChannel {
    /// Bind the socket on `addr`
    pub async fn bind(addr: &str) -> Result<Self, RelayError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                kind: "UDP",
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.socket.local_addr()?)
    }

    /// Drain datagrams until cancelled, then close the socket
    pub async fn run(self, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, from)) => {
                        tracing::trace!("Discarding {} byte datagram from {}", len, from);
                    }
                    Err(e) => {
                        tracing::warn!("Datagram receive error: {}", e);
                    }
                }
            }
        }

        tracing::info!("Datagram channel closed");
    }
}
