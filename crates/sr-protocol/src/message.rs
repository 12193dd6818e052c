//! Message types for the screen-relay protocol
//!
//! A [`Message`] is a kind tag, the id of the session that produced it, an
//! opaque payload and a creation timestamp. The relay only interprets the
//! kind; payload bytes belong to higher layers.
//!
//! # Message Flow
//!
//! 1. Client connects; the relay answers with `ConnectResponse` carrying the
//!    session id it assigned
//! 2. Client sends `Heartbeat` periodically, relay answers `HeartbeatAck`
//! 3. `StartShare` / `StopShare` from one client are announced to every other
//!    client, attributed to the sharing session
//! 4. `ScreenData` is forwarded verbatim to every other client
//! 5. Either side sends `Disconnect` to end the session

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Sender id used by the relay for messages it originates
pub const SERVER_SENDER_ID: &str = "SERVER";

/// Message kind tag, carried on the wire as a big-endian `i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MessageKind {
    /// Client asks to join (reserved, the relay does not require it)
    ConnectRequest = 1,
    /// Relay greeting sent when a session starts
    ConnectResponse = 2,
    /// Liveness ping from a client
    Heartbeat = 3,
    /// Relay answer to a heartbeat
    HeartbeatAck = 4,
    /// Sender started sharing its screen
    StartShare = 5,
    /// Sender stopped sharing its screen
    StopShare = 6,
    /// Opaque screen payload
    ScreenData = 7,
    /// Listing of connected clients (reserved)
    ClientList = 8,
    /// Error report
    Error = 9,
    /// End of session
    Disconnect = 10,
}

impl MessageKind {
    /// All kinds, in tag order
    pub const ALL: [MessageKind; 10] = [
        MessageKind::ConnectRequest,
        MessageKind::ConnectResponse,
        MessageKind::Heartbeat,
        MessageKind::HeartbeatAck,
        MessageKind::StartShare,
        MessageKind::StopShare,
        MessageKind::ScreenData,
        MessageKind::ClientList,
        MessageKind::Error,
        MessageKind::Disconnect,
    ];

    /// Convert to the wire tag
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Convert from the wire tag
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::ConnectRequest),
            2 => Some(Self::ConnectResponse),
            3 => Some(Self::Heartbeat),
            4 => Some(Self::HeartbeatAck),
            5 => Some(Self::StartShare),
            6 => Some(Self::StopShare),
            7 => Some(Self::ScreenData),
            8 => Some(Self::ClientList),
            9 => Some(Self::Error),
            10 => Some(Self::Disconnect),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::ConnectRequest => "CONNECT_REQUEST",
            MessageKind::ConnectResponse => "CONNECT_RESPONSE",
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::HeartbeatAck => "HEARTBEAT_ACK",
            MessageKind::StartShare => "START_SHARE",
            MessageKind::StopShare => "STOP_SHARE",
            MessageKind::ScreenData => "SCREEN_DATA",
            MessageKind::ClientList => "CLIENT_LIST",
            MessageKind::Error => "ERROR",
            MessageKind::Disconnect => "DISCONNECT",
        };
        f.write_str(name)
    }
}

/// A protocol message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    sender_id: String,
    payload: Bytes,
    timestamp: u64,
}

impl Message {
    /// Create a message with an empty payload, stamped with the current time
    pub fn new(kind: MessageKind, sender_id: impl Into<String>) -> Self {
        Self::with_payload(kind, sender_id, Bytes::new())
    }

    /// Create a message carrying a binary payload
    pub fn with_payload(
        kind: MessageKind,
        sender_id: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind,
            sender_id: sender_id.into(),
            payload: payload.into(),
            timestamp: now_millis(),
        }
    }

    /// Create a message carrying a UTF-8 text payload
    pub fn with_text(kind: MessageKind, sender_id: impl Into<String>, text: &str) -> Self {
        Self::with_payload(kind, sender_id, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Rebuild a message from decoded parts, keeping its original timestamp
    pub fn from_parts(
        kind: MessageKind,
        sender_id: String,
        payload: Bytes,
        timestamp: u64,
    ) -> Self {
        Self {
            kind,
            sender_id,
            payload,
            timestamp,
        }
    }

    /// Message kind
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Id of the session that produced this message
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Raw payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} ({} bytes, t={})",
            self.kind,
            self.sender_id,
            self.payload.len(),
            self.timestamp
        )
    }
}

/// Wall-clock ms for message timestamps. sr-core builds on this crate, so
/// its `time` helpers are not reachable here.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
