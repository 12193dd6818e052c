//! Core domain types

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::time::current_time_millis;

/// Process-wide counter making generated session ids unique
static NEXT_SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing id string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a connection from `peer`.
    ///
    /// Combines creation time, the peer label and a process-wide sequence
    /// number, so two calls never return the same id. The sequence number is
    /// returned alongside for admission ordering.
    pub fn generate(peer: &str) -> (Self, u64) {
        let seq = NEXT_SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        let peer: String = peer
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '/')
            .collect();
        let id = format!("CLIENT_{}_{}_{}", current_time_millis(), peer, seq);
        (Self(id), seq)
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Session is open for I/O
    Active = 0,
    /// Session is shutting down; no further sends are accepted
    Closing = 1,
    /// Transport closed and session released (terminal)
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Active,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Active => write!(f, "active"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Atomic holder for a [`SessionState`].
///
/// Transitions only move forward (`Active -> Closing -> Closed`) and each
/// one succeeds for exactly one caller, which makes it the arbiter for
/// close-once side effects.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Create a cell in the `Active` state
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Active as u8))
    }

    /// Current state
    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `Active -> Closing`. Returns true for the caller that won.
    pub fn begin_closing(&self) -> bool {
        self.transition(SessionState::Active, SessionState::Closing)
    }

    /// Move to `Closed` from `Active` or `Closing`. Returns true for the
    /// single caller that performed the transition.
    pub fn finish_closing(&self) -> bool {
        self.begin_closing();
        self.transition(SessionState::Closing, SessionState::Closed)
    }

    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let (id, _) = SessionId::generate("127.0.0.1:5000");
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn test_generated_id_shape() {
        let (id, seq) = SessionId::generate("/10.0.0.2:4242");
        assert!(id.as_str().starts_with("CLIENT_"));
        assert!(id.as_str().contains("10.0.0.2:4242"));
        assert!(!id.as_str().contains('/'));
        assert!(id.as_str().ends_with(&format!("_{}", seq)));
    }

    #[test]
    fn test_sequence_increases() {
        let (_, a) = SessionId::generate("x");
        let (_, b) = SessionId::generate("x");
        assert!(b > a);
    }

    #[test]
    fn test_state_forward_only() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), SessionState::Active);

        assert!(cell.begin_closing());
        assert!(!cell.begin_closing());
        assert_eq!(cell.get(), SessionState::Closing);

        assert!(cell.finish_closing());
        assert!(!cell.finish_closing());
        assert_eq!(cell.get(), SessionState::Closed);
        assert!(!cell.begin_closing());
    }

    #[test]
    fn test_finish_from_active() {
        let cell = StateCell::new();
        assert!(cell.finish_closing());
        assert_eq!(cell.get(), SessionState::Closed);
    }

    #[test]
    fn test_concurrent_finish_has_one_winner() {
        let cell = std::sync::Arc::new(StateCell::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = std::sync::Arc::clone(&cell);
                std::thread::spawn(move || cell.finish_closing())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::Closing.to_string(), "closing");
        assert_eq!(SessionId::new("abc").to_string(), "abc");
    }
}
