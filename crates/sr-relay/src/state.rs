//! Shared relay state and broadcast routing

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use sr_core::config::RelayConfig;
use sr_core::{RelayEvents, SessionId};
use sr_protocol::{Message, MessageKind};

use crate::session::SessionRegistry;

/// Notice text broadcast when a client starts sharing
pub const STARTED_SHARING_TEXT: &str = "Client started sharing";

/// Notice text broadcast when a client stops sharing
pub const STOPPED_SHARING_TEXT: &str = "Client stopped sharing";

/// State shared by the accept loop, session tasks and the liveness sweep
pub struct RelayState {
    /// Configuration
    pub config: RelayConfig,
    /// Live sessions
    pub registry: Arc<SessionRegistry>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// Send `message` to every registered session except `excluded`.
    ///
    /// Recipients are taken from a registry snapshot and the message is
    /// queued on each of them concurrently. A recipient that cannot take it
    /// within the send timeout is stopped; the others are unaffected.
    /// Returns the number of recipients the message was queued for.
    pub async fn broadcast_excluding(&self, message: &Message, excluded: &SessionId) -> usize {
        let recipients: Vec<_> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|s| s.id() != excluded)
            .collect();

        if recipients.is_empty() {
            tracing::trace!("No recipients for {} from {}", message.kind(), excluded);
            return 0;
        }

        let results = join_all(recipients.iter().map(|s| s.send(message))).await;

        let mut delivered = 0;
        for (session, ok) in recipients.iter().zip(results) {
            if ok {
                delivered += 1;
            } else {
                tracing::warn!("Failed to deliver {} to session {}", message.kind(), session.id());
            }
        }

        tracing::debug!(
            "Broadcast {} from {} to {}/{} sessions",
            message.kind(),
            excluded,
            delivered,
            recipients.len()
        );
        delivered
    }

    /// Remove a session from the registry and close it.
    ///
    /// Returns true if the session was still registered.
    pub async fn evict(&self, id: &SessionId) -> bool {
        match self.registry.remove(id) {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl RelayEvents for RelayState {
    async fn started_sharing(&self, session_id: &SessionId) {
        tracing::info!("Session {} started sharing", session_id);
        let notice = Message::with_text(
            MessageKind::StartShare,
            session_id.as_str(),
            STARTED_SHARING_TEXT,
        );
        self.broadcast_excluding(&notice, session_id).await;
    }

    async fn stopped_sharing(&self, session_id: &SessionId) {
        tracing::info!("Session {} stopped sharing", session_id);
        let notice = Message::with_text(
            MessageKind::StopShare,
            session_id.as_str(),
            STOPPED_SHARING_TEXT,
        );
        self.broadcast_excluding(&notice, session_id).await;
    }

    async fn forward_screen_data(&self, session_id: &SessionId, message: Message) {
        tracing::trace!(
            "Forwarding {} bytes of screen data from {}",
            message.payload().len(),
            session_id
        );
        self.broadcast_excluding(&message, session_id).await;
    }

    async fn remove_session(&self, session_id: &SessionId) {
        if self.evict(session_id).await {
            tracing::info!(
                "Session {} removed ({} active)",
                session_id,
                self.registry.count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use sr_core::{split_stream, FrameReader, SessionState};
    use sr_protocol::DEFAULT_MAX_PAYLOAD_SIZE;
    use std::time::Duration;

    use crate::session::{Session, OUTBOUND_QUEUE_CAPACITY};

    fn connect(state: &RelayState) -> (Arc<Session>, FrameReader) {
        connect_with_buffer(state, 64 * 1024)
    }

    /// Register a session whose transport holds at most `buffer` unread bytes
    fn connect_with_buffer(state: &RelayState, buffer: usize) -> (Arc<Session>, FrameReader) {
        let (server_side, client_side) = tokio::io::duplex(buffer);
        let (_server_reader, server_writer) = split_stream(server_side, DEFAULT_MAX_PAYLOAD_SIZE);
        let (client_reader, _client_writer) = split_stream(client_side, DEFAULT_MAX_PAYLOAD_SIZE);
        let (session, outbox) =
            Session::new("127.0.0.1:9", server_writer, state.config.send_timeout);
        tokio::spawn(outbox.run());
        let session = Arc::new(session);
        state.registry.add(Arc::clone(&session)).unwrap();
        (session, client_reader)
    }

    async fn recv(reader: &mut FrameReader) -> Option<Message> {
        match tokio::time::timeout(Duration::from_millis(200), reader.next()).await {
            Ok(Some(Ok(msg))) => Some(msg),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_broadcast_skips_excluded() {
        let state = RelayState::new(RelayConfig::default());
        let (a, mut a_rx) = connect(&state);
        let (_b, mut b_rx) = connect(&state);
        let (_c, mut c_rx) = connect(&state);

        let msg = Message::with_text(MessageKind::ScreenData, a.id().as_str(), "frame");
        assert_eq!(state.broadcast_excluding(&msg, a.id()).await, 2);

        assert_eq!(recv(&mut b_rx).await, Some(msg.clone()));
        assert_eq!(recv(&mut c_rx).await, Some(msg));
        assert_eq!(recv(&mut a_rx).await, None);
    }

    #[tokio::test]
    async fn test_broadcast_with_absent_exclusion_reaches_all() {
        let state = RelayState::new(RelayConfig::default());
        let (_a, mut a_rx) = connect(&state);
        let (_b, mut b_rx) = connect(&state);

        let msg = Message::new(MessageKind::StopShare, "ghost");
        let delivered = state
            .broadcast_excluding(&msg, &SessionId::new("ghost"))
            .await;
        assert_eq!(delivered, 2);
        assert!(recv(&mut a_rx).await.is_some());
        assert!(recv(&mut b_rx).await.is_some());
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failed_recipient() {
        let state = RelayState::new(RelayConfig::default());
        let (a, _a_rx) = connect(&state);
        let (b, _b_rx) = connect(&state);
        let (_c, mut c_rx) = connect(&state);

        b.close().await;

        let msg = Message::with_text(MessageKind::ScreenData, a.id().as_str(), "x");
        assert_eq!(state.broadcast_excluding(&msg, a.id()).await, 1);
        assert!(recv(&mut c_rx).await.is_some());
    }

    #[tokio::test]
    async fn test_stalled_recipient_does_not_hold_up_broadcast() {
        let state = RelayState::new(RelayConfig {
            send_timeout: Duration::from_millis(100),
            ..RelayConfig::default()
        });
        let (sharer, _sharer_rx) = connect(&state);
        let (stalled, _stalled_rx) = connect_with_buffer(&state, 64);
        let (_viewer, mut viewer_rx) = connect(&state);

        let rounds = OUTBOUND_QUEUE_CAPACITY + 8;
        let viewer = tokio::spawn(async move {
            let mut received = 0;
            while received < rounds {
                match viewer_rx.next().await {
                    Some(Ok(_)) => received += 1,
                    _ => break,
                }
            }
            received
        });

        let frame = Message::with_payload(
            MessageKind::ScreenData,
            sharer.id().as_str(),
            vec![0u8; 4096],
        );
        let first = tokio::time::timeout(
            Duration::from_secs(2),
            state.broadcast_excluding(&frame, sharer.id()),
        )
        .await
        .expect("first broadcast held up by a recipient that is not reading");
        assert_eq!(first, 2);

        tokio::time::timeout(Duration::from_secs(2), async {
            for _ in 1..rounds {
                state.broadcast_excluding(&frame, sharer.id()).await;
            }
        })
        .await
        .expect("broadcasts held up by a recipient that is not reading");

        assert_eq!(viewer.await.unwrap(), rounds);
        assert!(!stalled.is_active());
        assert!(sharer.is_active());
    }

    #[tokio::test]
    async fn test_share_notice_attributed_to_sender() {
        let state = RelayState::new(RelayConfig::default());
        let (a, mut a_rx) = connect(&state);
        let (_b, mut b_rx) = connect(&state);

        state.started_sharing(a.id()).await;
        let notice = recv(&mut b_rx).await.unwrap();
        assert_eq!(notice.kind(), MessageKind::StartShare);
        assert_eq!(notice.sender_id(), a.id().as_str());
        assert_eq!(notice.payload_text(), STARTED_SHARING_TEXT);

        state.stopped_sharing(a.id()).await;
        let notice = recv(&mut b_rx).await.unwrap();
        assert_eq!(notice.kind(), MessageKind::StopShare);
        assert_eq!(notice.payload_text(), STOPPED_SHARING_TEXT);

        assert_eq!(recv(&mut a_rx).await, None);
    }

    #[tokio::test]
    async fn test_remove_session_is_idempotent() {
        let state = RelayState::new(RelayConfig::default());
        let (a, _a_rx) = connect(&state);

        state.remove_session(a.id()).await;
        state.remove_session(a.id()).await;

        assert!(!state.registry.contains(a.id()));
        assert_eq!(a.state(), SessionState::Closed);
        assert!(!state.evict(a.id()).await);
    }
}
