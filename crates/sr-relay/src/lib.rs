//! sr-relay: Relay server for screen-relay
//!
//! The relay accepts client sessions over TCP, answers heartbeats, and fans
//! out share notifications and screen data from one client to all the
//! others. Silent clients are evicted by a periodic liveness sweep.

pub mod error;
pub mod server;
pub mod session;
pub mod state;

pub use error::{RegistryError, RelayError};
pub use server::{RelayHandle, RelayServer};
pub use session::{Session, SessionRegistry};
pub use state::RelayState;
