//! Relay error types

use sr_core::SessionId;
use thiserror::Error;

/// Errors raised while starting or running the relay server
#[derive(Error, Debug)]
pub enum RelayError {
    /// A listening socket could not be bound
    #[error("Failed to bind {kind} socket on {addr}: {source}")]
    Bind {
        kind: &'static str,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a listening socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned when admitting a session into the registry
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Shutdown has begun; no new sessions are admitted
    #[error("Relay is shutting down")]
    ShuttingDown,

    /// A session with the same id is already registered
    #[error("Session already registered: {0}")]
    Duplicate(SessionId),
}
