//! Relay server: TCP accept loop and datagram side channel

mod datagram;
mod listener;

pub use datagram::DatagramChannel;
pub use listener::{RelayHandle, RelayServer, SHUTDOWN_TEXT};
