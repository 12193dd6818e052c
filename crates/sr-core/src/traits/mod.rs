//! Core trait definitions

mod relay;

pub use relay::RelayEvents;
