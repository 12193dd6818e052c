//! Frame body encoding/decoding
//!
//! A frame body has the following layout (all integers big-endian):
//! - magic: 4 bytes (`0xABCDEF00`)
//! - kind: 4 bytes (i32)
//! - sender id length: 4 bytes (i32), then the sender id bytes (UTF-8)
//! - timestamp: 8 bytes (ms since epoch)
//! - payload length: 4 bytes (i32), then the payload bytes
//!
//! On a stream each body is preceded by a 4-byte length; that prefix is
//! handled by [`crate::codec::MessageCodec`], not here.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::message::{Message, MessageKind};

/// Marker at the start of every frame body
pub const MAGIC: u32 = 0xABCD_EF00;

/// Size of the stream length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Fixed-width part of a frame body: magic, kind, two lengths and timestamp
pub const FIXED_BODY_SIZE: usize = 4 + 4 + 4 + 8 + 4;

/// Default maximum frame/payload size (1 MiB)
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Smallest usable frame limit. Anything lower would reject control
/// messages such as the connect response once their sender id is added.
pub const MIN_FRAME_LIMIT: usize = 1024;

/// Number of bytes `message` occupies as a frame body
pub fn encoded_len(message: &Message) -> usize {
    FIXED_BODY_SIZE + message.sender_id().len() + message.payload().len()
}

/// Encode a message into a standalone frame body
pub fn encode(message: &Message) -> Bytes {
    let mut dst = BytesMut::with_capacity(encoded_len(message));
    encode_into(message, &mut dst);
    dst.freeze()
}

/// Append the frame body for `message` to `dst`
pub fn encode_into(message: &Message, dst: &mut BytesMut) {
    let sender = message.sender_id().as_bytes();
    let payload = message.payload();

    dst.reserve(encoded_len(message));
    dst.put_u32(MAGIC);
    dst.put_i32(message.kind().as_i32());
    dst.put_i32(sender.len() as i32);
    dst.put_slice(sender);
    dst.put_u64(message.timestamp());
    dst.put_i32(payload.len() as i32);
    dst.put_slice(payload);
}

/// Decode a frame body using the default payload limit
pub fn decode(body: &[u8]) -> Result<Message, ProtocolError> {
    decode_with_limit(body, DEFAULT_MAX_PAYLOAD_SIZE)
}

/// Decode a frame body, rejecting payloads larger than `max_payload`
///
/// The input is never consumed or modified, so a failed decode leaves the
/// caller's buffer untouched. Bytes after the payload are ignored.
pub fn decode_with_limit(body: &[u8], max_payload: usize) -> Result<Message, ProtocolError> {
    let mut src = body;

    let magic = read_u32(&mut src, "magic")?;
    if magic != MAGIC {
        return Err(ProtocolError::BadMagic(magic));
    }

    let tag = read_i32(&mut src, "kind")?;
    let kind = MessageKind::from_i32(tag).ok_or(ProtocolError::UnknownMessageKind(tag))?;

    let sender_len = read_len(&mut src, "sender id length")?;
    let sender = read_bytes(&mut src, sender_len, "sender id")?;
    let sender_id = String::from_utf8_lossy(sender).into_owned();

    let timestamp = read_u64(&mut src, "timestamp")?;

    let payload_len = read_len(&mut src, "payload length")?;
    if payload_len > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    let payload = Bytes::copy_from_slice(read_bytes(&mut src, payload_len, "payload")?);

    Ok(Message::from_parts(kind, sender_id, payload, timestamp))
}

fn ensure(src: &[u8], needed: usize, field: &'static str) -> Result<(), ProtocolError> {
    if src.len() < needed {
        return Err(ProtocolError::Truncated {
            field,
            expected: needed,
            actual: src.len(),
        });
    }
    Ok(())
}

fn read_u32(src: &mut &[u8], field: &'static str) -> Result<u32, ProtocolError> {
    ensure(src, 4, field)?;
    Ok(src.get_u32())
}

fn read_i32(src: &mut &[u8], field: &'static str) -> Result<i32, ProtocolError> {
    ensure(src, 4, field)?;
    Ok(src.get_i32())
}

fn read_u64(src: &mut &[u8], field: &'static str) -> Result<u64, ProtocolError> {
    ensure(src, 8, field)?;
    Ok(src.get_u64())
}

fn read_len(src: &mut &[u8], field: &'static str) -> Result<usize, ProtocolError> {
    let length = read_i32(src, field)?;
    if length < 0 {
        return Err(ProtocolError::NegativeLength { field, length });
    }
    Ok(length as usize)
}

fn read_bytes<'a>(
    src: &mut &'a [u8],
    len: usize,
    field: &'static str,
) -> Result<&'a [u8], ProtocolError> {
    ensure(src, len, field)?;
    let rest: &'a [u8] = *src;
    let (head, tail) = rest.split_at(len);
    *src = tail;
    Ok(head)
}
