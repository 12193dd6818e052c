//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing, encoding or decoding messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame body does not start with the protocol magic number
    #[error("Invalid magic number: {0:#010x}")]
    BadMagic(u32),

    /// Unknown message kind tag
    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(i32),

    /// Length prefix on the stream is zero, negative or above the limit
    #[error("Invalid frame length: {length} (max {max})")]
    InvalidFrameLength { length: i64, max: usize },

    /// A length field inside the frame body is negative
    #[error("Negative length for {field}: {length}")]
    NegativeLength { field: &'static str, length: i32 },

    /// The frame body ended before a declared field was complete
    #[error("Truncated {field}: expected {expected} bytes, {actual} remaining")]
    Truncated {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Payload exceeds maximum size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Encoded frame would exceed maximum size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error came from the transport rather than from frame content
    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }
}
