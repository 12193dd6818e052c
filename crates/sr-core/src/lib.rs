//! sr-core: Core abstractions and configuration for screen-relay
//!
//! This crate provides shared types, traits, and configuration structures
//! used by the relay server and the client.

pub mod config;
pub mod error;
pub mod link;
pub mod periodic;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ConfigError, SendError};
pub use link::{split_stream, FrameReader, FrameWriter};
pub use periodic::PeriodicTask;
pub use traits::RelayEvents;
pub use types::{SessionId, SessionState, StateCell};
