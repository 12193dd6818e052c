//! Server-side session: one client connection and its read loop

use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sr_core::time::{current_time_millis, elapsed_millis_at};
use sr_core::{FrameReader, FrameWriter, RelayEvents, SessionId, SessionState, StateCell};
use sr_protocol::{Message, MessageKind, SERVER_SENDER_ID};

/// Messages queued for one client before senders start waiting
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// A connected client as seen by the relay.
///
/// The session exclusively owns its transport. Its read loop runs as one
/// task and its [`Outbox`] writes queued messages as another; any other task
/// may call [`Session::send`].
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    /// Admission order
    seq: u64,
    peer: String,
    state: Arc<StateCell>,
    /// Last time a frame was received, in ms since the epoch
    last_seen: AtomicU64,
    outbound: mpsc::Sender<Message>,
    /// Longest a send may wait for room in the outbound queue
    send_timeout: Duration,
    writer: Arc<FrameWriter>,
    /// Aborts the read loop, the outbox and any in-flight send
    cancel: CancellationToken,
}

/// Write half of a session: drains the outbound queue onto the transport.
///
/// A client that stops reading only ever blocks its own outbox, never the
/// sessions broadcasting to it.
#[derive(Debug)]
pub struct Outbox {
    id: SessionId,
    queue: mpsc::Receiver<Message>,
    writer: Arc<FrameWriter>,
    state: Arc<StateCell>,
    cancel: CancellationToken,
}

impl Outbox {
    /// Write queued messages until the session stops or a write fails
    pub async fn run(mut self) {
        loop {
            let msg = tokio::select! {
                _ = self.cancel.cancelled() => break,
                msg = self.queue.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.writer.send(&msg) => result,
            };

            if let Err(e) = result {
                tracing::warn!("Failed to send {} to session {}: {}", msg.kind(), self.id, e);
                self.state.begin_closing();
                self.cancel.cancel();
                break;
            }
        }

        tracing::trace!("Session {} outbox stopped", self.id);
    }
}

impl Session {
    /// Create a session for a freshly accepted connection from `peer`.
    ///
    /// The returned [`Outbox`] must be spawned for queued messages to reach
    /// the client.
    pub fn new(
        peer: impl Into<String>,
        writer: FrameWriter,
        send_timeout: Duration,
    ) -> (Self, Outbox) {
        let peer = peer.into();
        let (id, seq) = SessionId::generate(&peer);
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let state = Arc::new(StateCell::new());
        let writer = Arc::new(writer);
        let cancel = CancellationToken::new();

        let outbox = Outbox {
            id: id.clone(),
            queue,
            writer: Arc::clone(&writer),
            state: Arc::clone(&state),
            cancel: cancel.clone(),
        };

        let session = Self {
            id,
            seq,
            peer,
            state,
            last_seen: AtomicU64::new(current_time_millis()),
            outbound,
            send_timeout,
            writer,
            cancel,
        };
        (session, outbox)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == SessionState::Active
    }

    /// Last time a frame was received (ms since the epoch)
    pub fn last_seen_millis(&self) -> u64 {
        self.last_seen.load(Ordering::Acquire)
    }

    /// Milliseconds since the last received frame, as of `now`
    pub fn idle_millis(&self, now: u64) -> u64 {
        elapsed_millis_at(self.last_seen_millis(), now)
    }

    /// Resolves once the session has been told to stop
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    fn touch(&self) {
        self.last_seen.store(current_time_millis(), Ordering::Release);
    }

    /// Queue a message for this client.
    ///
    /// Returns false if the session is no longer active, or if the outbound
    /// queue stayed full for longer than the send timeout. A client that
    /// falls that far behind is stopped.
    pub async fn send(&self, msg: &Message) -> bool {
        if !self.is_active() {
            return false;
        }

        let reserved = tokio::select! {
            reserved = tokio::time::timeout(self.send_timeout, self.outbound.reserve()) => reserved,
            _ = self.cancel.cancelled() => return false,
        };

        match reserved {
            Ok(Ok(permit)) => {
                permit.send(msg.clone());
                true
            }
            Ok(Err(_)) => {
                tracing::debug!("Session {} outbox is gone, dropping {}", self.id, msg.kind());
                self.stop();
                false
            }
            Err(_) => {
                tracing::warn!(
                    "Session {} not reading, dropping it after {:?} waiting to send {}",
                    self.id,
                    self.send_timeout,
                    msg.kind()
                );
                self.stop();
                false
            }
        }
    }

    /// Move to closing and abort the read loop without touching the transport
    pub fn stop(&self) {
        if self.state.begin_closing() {
            tracing::debug!("Session {} closing", self.id);
        }
        self.cancel.cancel();
    }

    /// Close the transport and mark the session closed.
    ///
    /// Safe to call from several tasks at once; only the first call does the
    /// work and returns true.
    pub async fn close(&self) -> bool {
        if !self.state.finish_closing() {
            return false;
        }
        self.cancel.cancel();
        self.writer.shutdown().await;
        tracing::debug!("Session {} closed", self.id);
        true
    }

    /// Send the server-assigned id to the client
    pub async fn greet(&self) -> bool {
        let response = Message::with_text(
            MessageKind::ConnectResponse,
            SERVER_SENDER_ID,
            self.id.as_str(),
        );
        self.send(&response).await
    }

    /// Read and dispatch frames until the client disconnects, the stream
    /// fails, or the session is stopped. Always ends by asking the relay to
    /// remove the session.
    pub async fn run(self: Arc<Self>, mut reader: FrameReader, events: Arc<dyn RelayEvents>) {
        tracing::debug!("Session {} read loop started", self.id);

        while self.is_active() {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Session {} read loop cancelled", self.id);
                    break;
                }
                next = reader.next() => next,
            };

            match next {
                Some(Ok(msg)) => {
                    self.touch();
                    if !self.dispatch(msg, events.as_ref()).await {
                        break;
                    }
                }
                Some(Err(e)) if e.is_transport() => {
                    tracing::info!("Session {} transport error: {}", self.id, e);
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!("Session {} sent a malformed frame: {}", self.id, e);
                    break;
                }
                None => {
                    tracing::info!("Session {} closed the connection", self.id);
                    break;
                }
            }
        }

        self.stop();
        events.remove_session(&self.id).await;
    }

    /// Handle one inbound message. Returns false when the loop should end.
    async fn dispatch(&self, msg: Message, events: &dyn RelayEvents) -> bool {
        tracing::debug!("Session {} received {}", self.id, msg);

        match msg.kind() {
            MessageKind::Heartbeat => {
                let ack = Message::new(MessageKind::HeartbeatAck, SERVER_SENDER_ID);
                self.send(&ack).await;
            }
            MessageKind::StartShare => events.started_sharing(&self.id).await,
            MessageKind::StopShare => events.stopped_sharing(&self.id).await,
            MessageKind::ScreenData => events.forward_screen_data(&self.id, msg).await,
            MessageKind::Disconnect => {
                tracing::info!("Session {} requested disconnect", self.id);
                return false;
            }
            MessageKind::ConnectRequest
            | MessageKind::ConnectResponse
            | MessageKind::HeartbeatAck
            | MessageKind::ClientList
            | MessageKind::Error => {
                tracing::debug!("Session {} ignoring {}", self.id, msg.kind());
            }
        }

        true
    }
}
