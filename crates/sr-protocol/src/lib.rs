//! sr-protocol: Wire protocol for the screen-relay session relay
//!
//! This crate defines the binary frame format exchanged between relay
//! clients and the relay server, and a tokio codec that reads and writes
//! length-prefixed frames on a byte stream.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::MessageCodec;
pub use error::ProtocolError;
pub use frame::{
    decode, decode_with_limit, encode, DEFAULT_MAX_PAYLOAD_SIZE, MAGIC, MIN_FRAME_LIMIT,
};
pub use message::{Message, MessageKind, SERVER_SENDER_ID};
