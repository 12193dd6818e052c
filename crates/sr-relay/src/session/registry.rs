//! Registry of live sessions

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sr_core::SessionId;

use super::Session;
use crate::error::RegistryError;

/// Concurrent collection of the relay's live sessions, keyed by id
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Admission gate; held for reading across each insert so closing it
    /// waits out any add already in progress
    accepting: RwLock<bool>,
}

impl SessionRegistry {
    /// Create an empty registry that accepts sessions
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            accepting: RwLock::new(true),
        }
    }

    /// Register a session.
    ///
    /// Fails once admissions are closed or if the id is already present.
    pub fn add(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let accepting = self.accepting.read().unwrap_or_else(PoisonError::into_inner);
        if !*accepting {
            return Err(RegistryError::ShuttingDown);
        }

        match self.sessions.entry(session.id().clone()) {
            Entry::Occupied(entry) => Err(RegistryError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    /// Remove a session by id. Removing an absent id is a no-op.
    pub fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.remove(id).map(|(_, session)| session)
    }

    /// Get a session by id
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|r| Arc::clone(&r))
    }

    /// Point-in-time copy of all sessions, in admission order.
    ///
    /// Sessions added or removed after the call are not reflected.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = self.sessions.iter().map(|r| Arc::clone(&r)).collect();
        sessions.sort_by_key(|s| s.seq());
        sessions
    }

    /// Number of registered sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Stop admitting sessions. Every later [`add`](Self::add) fails.
    pub fn close_admissions(&self) {
        let mut accepting = self.accepting.write().unwrap_or_else(PoisonError::into_inner);
        *accepting = false;
    }

    pub fn is_accepting(&self) -> bool {
        *self.accepting.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
