//! sr-client: Client for the screen-relay server
//!
//! Connects to a relay with bounded retries, keeps the session alive with
//! periodic heartbeats, and exposes share/screen-data operations plus a
//! stream of messages relayed from other clients.

pub mod connector;
pub mod output;
pub mod retry;
pub mod session;
pub mod shell;

pub use connector::{ConnectError, RelayConnector};
pub use retry::FixedRetry;
pub use session::ClientSession;
