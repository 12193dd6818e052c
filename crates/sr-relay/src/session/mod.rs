//! Session management for the relay

mod connection;
mod liveness;
mod registry;

pub use connection::{Outbox, Session, OUTBOUND_QUEUE_CAPACITY};
pub use liveness::{evict_stale, spawn_liveness_sweep};
pub use registry::SessionRegistry;
