//! Client-side session
//!
//! Mirrors the relay's session from the other end of the connection: a
//! read loop decodes frames from the relay and a periodic task keeps the
//! session alive with heartbeats. Messages meant for the application are
//! handed out through [`ClientSession::recv`].

use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sr_core::config::ClientConfig;
use sr_core::time::current_time_millis;
use sr_core::{
    split_stream, FrameReader, FrameWriter, PeriodicTask, SendError, SessionState, StateCell,
};
use sr_protocol::{Message, MessageKind};

/// Messages buffered for the application before the read loop waits
const INBOX_CAPACITY: usize = 256;

/// State shared between the session handle, its read loop and the
/// heartbeat task
struct Shared {
    local_id: String,
    /// Id assigned by the relay in its connect response
    assigned_id: OnceLock<String>,
    state: StateCell,
    writer: FrameWriter,
    cancel: CancellationToken,
}

impl Shared {
    fn sender_id(&self) -> &str {
        self.assigned_id.get().unwrap_or(&self.local_id)
    }

    async fn send(&self, msg: &Message) -> bool {
        if self.state.get() != SessionState::Active {
            return false;
        }

        let result = tokio::select! {
            result = self.writer.send(msg) => result,
            _ = self.cancel.cancelled() => Err(SendError::NotOpen),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send {}: {}", msg.kind(), e);
                self.stop();
                false
            }
        }
    }

    fn stop(&self) {
        if self.state.begin_closing() {
            tracing::debug!("Client session {} closing", self.local_id);
        }
        self.cancel.cancel();
    }

    async fn close(&self) -> bool {
        if !self.state.finish_closing() {
            return false;
        }
        self.cancel.cancel();
        self.writer.shutdown().await;
        tracing::info!("Disconnected from relay");
        true
    }
}

/// A connected session with the relay
pub struct ClientSession {
    shared: Arc<Shared>,
    inbox: mpsc::Receiver<Message>,
    heartbeat: Option<PeriodicTask>,
    reader: Option<JoinHandle<()>>,
}

impl ClientSession {
    /// Start the read loop and heartbeat on an established connection.
    pub fn start<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let local_id = config
            .client_name
            .clone()
            .unwrap_or_else(|| format!("CLIENT_{}", current_time_millis()));

        let (frames, writer) = split_stream(stream, config.max_payload_size);
        let shared = Arc::new(Shared {
            local_id,
            assigned_id: OnceLock::new(),
            state: StateCell::new(),
            writer,
            cancel: CancellationToken::new(),
        });

        let (inbox_tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let reader = tokio::spawn(read_loop(Arc::clone(&shared), frames, inbox_tx));

        let heartbeat_shared = Arc::clone(&shared);
        let heartbeat = PeriodicTask::spawn(
            "heartbeat",
            config.heartbeat_interval,
            &shared.cancel,
            move || {
                let shared = Arc::clone(&heartbeat_shared);
                async move {
                    let heartbeat = Message::new(MessageKind::Heartbeat, shared.sender_id());
                    shared.send(&heartbeat).await
                }
            },
        );

        tracing::debug!("Client session {} started", shared.local_id);

        Self {
            shared,
            inbox,
            heartbeat: Some(heartbeat),
            reader: Some(reader),
        }
    }

    /// Id this client generated for itself
    pub fn local_id(&self) -> &str {
        &self.shared.local_id
    }

    /// Id the relay assigned, once its connect response has arrived
    pub fn assigned_id(&self) -> Option<&str> {
        self.shared.assigned_id.get().map(String::as_str)
    }

    /// Sender id stamped on outgoing messages
    pub fn sender_id(&self) -> &str {
        self.shared.sender_id()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Next message delivered by the relay, or `None` once the session has
    /// ended and all buffered messages were taken.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbox.recv().await
    }

    /// Send a message. Returns false if the session is closed or the write
    /// fails; a failed write ends the session.
    pub async fn send(&self, msg: &Message) -> bool {
        self.shared.send(msg).await
    }

    pub async fn start_share(&self) -> bool {
        let msg = Message::new(MessageKind::StartShare, self.sender_id());
        self.send(&msg).await
    }

    pub async fn stop_share(&self) -> bool {
        let msg = Message::new(MessageKind::StopShare, self.sender_id());
        self.send(&msg).await
    }

    pub async fn send_screen_data(&self, data: impl Into<Bytes>) -> bool {
        let msg = Message::with_payload(MessageKind::ScreenData, self.sender_id(), data);
        self.send(&msg).await
    }

    /// Tell the relay we are leaving, then close the connection and stop
    /// the background tasks.
    pub async fn disconnect(&mut self) {
        let msg = Message::new(MessageKind::Disconnect, self.sender_id());
        self.send(&msg).await;
        self.shared.close().await;

        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

async fn read_loop(shared: Arc<Shared>, mut frames: FrameReader, inbox: mpsc::Sender<Message>) {
    loop {
        let next = tokio::select! {
            _ = shared.cancel.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(msg)) => {
                if !dispatch(&shared, msg, &inbox).await {
                    break;
                }
            }
            Some(Err(e)) if e.is_transport() => {
                tracing::warn!("Connection to relay failed: {}", e);
                break;
            }
            Some(Err(e)) => {
                tracing::warn!("Relay sent a malformed frame: {}", e);
                break;
            }
            None => {
                tracing::info!("Relay closed the connection");
                break;
            }
        }
    }

    shared.stop();
    shared.close().await;
}

/// Handle one message from the relay. Returns false when the loop should
/// end.
async fn dispatch(shared: &Shared, msg: Message, inbox: &mpsc::Sender<Message>) -> bool {
    match msg.kind() {
        MessageKind::ConnectResponse => {
            let id = msg.payload_text();
            tracing::info!("Relay assigned session id {}", id);
            if shared.assigned_id.set(id).is_err() {
                tracing::debug!("Ignoring repeated connect response");
            }
            return true;
        }
        MessageKind::HeartbeatAck => {
            tracing::debug!("Heartbeat acknowledged");
            return true;
        }
        MessageKind::StartShare | MessageKind::StopShare => {
            tracing::info!("{} from {}: {}", msg.kind(), msg.sender_id(), msg.payload_text());
        }
        MessageKind::ScreenData => {
            tracing::debug!(
                "Screen data from {} ({} bytes)",
                msg.sender_id(),
                msg.payload().len()
            );
        }
        MessageKind::Error => {
            tracing::warn!("Relay reported an error: {}", msg.payload_text());
        }
        MessageKind::ClientList => {
            tracing::debug!("Client list received ({} bytes)", msg.payload().len());
        }
        MessageKind::Disconnect => {
            tracing::info!("Relay disconnected us: {}", msg.payload_text());
            deliver(shared, msg, inbox).await;
            return false;
        }
        MessageKind::ConnectRequest | MessageKind::Heartbeat => {
            tracing::debug!("Ignoring {} from relay", msg.kind());
            return true;
        }
    }

    deliver(shared, msg, inbox).await;
    true
}

async fn deliver(shared: &Shared, msg: Message, inbox: &mpsc::Sender<Message>) {
    tokio::select! {
        result = inbox.send(msg) => {
            if result.is_err() {
                tracing::trace!("Application stopped receiving messages");
            }
        }
        _ = shared.cancel.cancelled() => {}
    }
}
