//! Core error types for screen-relay

use sr_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned when writing a frame to a session transport
#[derive(Error, Debug)]
pub enum SendError {
    /// The transport was already closed
    #[error("Transport is not open")]
    NotOpen,

    /// Encoding or writing the frame failed
    #[error("Write failed: {0}")]
    Write(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
