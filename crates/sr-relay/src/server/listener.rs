//! Relay server listener
//!
//! Accepts incoming connections, admits them as sessions up to the
//! configured capacity, and orchestrates graceful shutdown.

use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use sr_core::config::RelayConfig;
use sr_core::{split_stream, RelayEvents};
use sr_protocol::{Message, MessageKind, SERVER_SENDER_ID};

use super::datagram::DatagramChannel;
use crate::error::RelayError;
use crate::session::{spawn_liveness_sweep, Session};
use crate::state::RelayState;

/// Notice text sent to every session when the relay stops
pub const SHUTDOWN_TEXT: &str = "Server shutting down";

/// Relay server bound to its sockets and ready to run
pub struct RelayServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    datagram: Option<DatagramChannel>,
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

/// Handle used to stop a running relay from another task
#[derive(Clone)]
pub struct RelayHandle {
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

impl RelayHandle {
    /// Begin graceful shutdown
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }
}

impl RelayServer {
    /// Bind the TCP listener, and the datagram socket if enabled.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let bind_addr = config.bind_address();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| RelayError::Bind {
                kind: "TCP",
                addr: bind_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Relay listening on {}", local_addr);

        let datagram = if config.enable_udp {
            let channel = DatagramChannel::bind(&config.udp_address()).await?;
            tracing::info!("Datagram channel bound on {}", channel.local_addr()?);
            Some(channel)
        } else {
            None
        };

        Ok(Self {
            listener,
            local_addr,
            datagram,
            state: Arc::new(RelayState::new(config)),
            cancel: CancellationToken::new(),
        })
    }

    /// Address the TCP listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address the datagram socket is bound to, if enabled
    pub fn datagram_addr(&self) -> Option<SocketAddr> {
        self.datagram.as_ref().and_then(|d| d.local_addr().ok())
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    pub fn handle(&self) -> RelayHandle {
        RelayHandle {
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        }
    }

    /// Accept connections until shutdown is requested, then stop every
    /// session.
    pub async fn run(self) -> Result<(), RelayError> {
        let RelayServer {
            listener,
            datagram,
            state,
            cancel,
            ..
        } = self;

        let pool = Arc::new(Semaphore::new(state.config.worker_pool_size));
        let mut tasks = JoinSet::new();

        let sweep = spawn_liveness_sweep(Arc::clone(&state), &cancel);
        let datagram_task = datagram.map(|channel| tokio::spawn(channel.run(cancel.child_token())));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Relay shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => {
                            admit(&state, &pool, &mut tasks, socket, peer_addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                        }
                    }
                }

                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        if e.is_panic() {
                            tracing::error!("Session task panicked: {}", e);
                        }
                    }
                }
            }
        }

        // Stop admissions before anything else so the notice reaches everyone
        state.registry.close_admissions();
        drop(listener);
        sweep.stop().await;

        let notice = Message::with_text(MessageKind::Disconnect, SERVER_SENDER_ID, SHUTDOWN_TEXT);
        let sessions = state.registry.snapshot();
        let notified = join_all(sessions.iter().map(|s| s.send(&notice)))
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();
        tracing::info!("Sent shutdown notice to {}/{} sessions", notified, sessions.len());

        if let Some(task) = datagram_task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("Datagram task panicked: {}", e);
                }
            }
        }

        let grace = state.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            let remaining = state.registry.snapshot();
            tracing::warn!(
                "{} sessions still open after {:?}, forcing shutdown",
                remaining.len(),
                grace
            );
            for session in remaining {
                state.evict(session.id()).await;
            }
            tasks.shutdown().await;
        }

        tracing::info!("Relay stopped");
        Ok(())
    }
}

/// Admit one accepted connection, or close it if the relay is full.
fn admit(
    state: &Arc<RelayState>,
    pool: &Arc<Semaphore>,
    tasks: &mut JoinSet<()>,
    socket: TcpStream,
    peer_addr: SocketAddr,
) {
    let active = state.registry.count();
    if active >= state.config.max_sessions {
        tracing::warn!(
            "Rejecting connection from {}: at capacity ({} sessions)",
            peer_addr,
            active
        );
        drop(socket);
        return;
    }

    if let Err(e) = socket.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
    }

    let (reader, writer) = split_stream(socket, state.config.max_payload_size);
    let (session, outbox) = Session::new(peer_addr.to_string(), writer, state.config.send_timeout);
    let session = Arc::new(session);

    if let Err(e) = state.registry.add(Arc::clone(&session)) {
        tracing::warn!("Not admitting connection from {}: {}", peer_addr, e);
        return;
    }

    tracing::info!(
        "Session {} connected from {} ({} active)",
        session.id(),
        peer_addr,
        state.registry.count()
    );

    let events: Arc<dyn RelayEvents> = Arc::clone(state) as Arc<dyn RelayEvents>;
    let pool = Arc::clone(pool);

    tasks.spawn(outbox.run());
    tasks.spawn(async move {
        session.greet().await;

        // Registered sessions receive broadcasts while waiting for a worker
        let permit = tokio::select! {
            permit = pool.acquire_owned() => permit,
            _ = session.cancelled() => {
                events.remove_session(session.id()).await;
                return;
            }
        };

        let Ok(_permit) = permit else {
            events.remove_session(session.id()).await;
            return;
        };

        session.run(reader, events).await;
    });
}
