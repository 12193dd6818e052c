//! Session-to-relay callbacks

use async_trait::async_trait;
use sr_protocol::Message;

use crate::types::SessionId;

/// Events a server-side session raises toward the relay that owns it.
///
/// Sessions hold this as a trait object so they never depend on the relay
/// state directly.
#[async_trait]
pub trait RelayEvents: Send + Sync {
    /// The session announced it started sharing
    async fn started_sharing(&self, session_id: &SessionId);

    /// The session announced it stopped sharing
    async fn stopped_sharing(&self, session_id: &SessionId);

    /// The session sent screen data to be forwarded to everyone else
    async fn forward_screen_data(&self, session_id: &SessionId, message: Message);

    /// The session's read loop ended and it should leave the registry
    async fn remove_session(&self, session_id: &SessionId);
}
