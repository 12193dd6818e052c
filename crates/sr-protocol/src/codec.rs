//! Tokio codec for length-prefixed protocol messages

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{self, DEFAULT_MAX_PAYLOAD_SIZE, LENGTH_PREFIX_SIZE};
use crate::message::Message;

/// Codec for encoding/decoding length-prefixed frames
///
/// Every frame is a 4-byte big-endian body length followed by the body
/// described in [`crate::frame`]. Lengths that are zero, negative or above
/// `max_frame_size` are rejected before any body bytes are buffered.
#[derive(Debug)]
pub struct MessageCodec {
    /// Largest accepted frame body, also the payload limit
    max_frame_size: usize,
    /// Body length of the frame being decoded (if the prefix was already read)
    pending_len: Option<usize>,
}

impl MessageCodec {
    /// Create a codec with the default 1 MiB limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with a custom frame size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            pending_len: None,
        }
    }

    /// Largest accepted frame body
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let body_len = match self.pending_len.take() {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let length = src.get_i32();
                if length <= 0 || length as usize > self.max_frame_size {
                    return Err(ProtocolError::InvalidFrameLength {
                        length: length as i64,
                        max: self.max_frame_size,
                    });
                }
                length as usize
            }
        };

        if src.len() < body_len {
            // Wait for the rest of the body
            src.reserve(body_len - src.len());
            self.pending_len = Some(body_len);
            return Ok(None);
        }

        let body = src.split_to(body_len).freeze();
        let message = frame::decode_with_limit(&body, self.max_frame_size)?;
        tracing::trace!("Decoded {} ({} byte frame)", message.kind(), body_len);
        Ok(Some(message))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = message.payload().len();
        if payload_len > self.max_frame_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            });
        }

        let body_len = frame::encoded_len(&message);
        if body_len > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: body_len,
                max: self.max_frame_size,
            });
        }

        // Prefix and body go into the same buffer so they hit the wire together
        dst.reserve(LENGTH_PREFIX_SIZE + body_len);
        dst.put_i32(body_len as i32);
        frame::encode_into(&message, dst);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use bytes::Bytes;

    fn screen_data(payload: &'static [u8]) -> Message {
        Message::from_parts(
            MessageKind::ScreenData,
            "CLIENT_1".to_string(),
            Bytes::from_static(payload),
            99,
        )
    }

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = MessageCodec::new();
        let msg = screen_data(&[1, 2, 3]);

        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), LENGTH_PREFIX_SIZE + frame::encoded_len(&msg));

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = MessageCodec::new();

        let mut full_buf = BytesMut::new();
        codec
            .encode(screen_data(b"hello"), &mut full_buf)
            .unwrap();

        // Only part of the length prefix
        let mut partial = full_buf.split_to(LENGTH_PREFIX_SIZE - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Prefix plus part of the body
        partial.extend_from_slice(&full_buf.split_to(6));
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full_buf);
        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.payload().as_ref(), b"hello");
    }

    #[test]
    fn test_codec_two_frames_in_one_buffer() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(screen_data(b"a"), &mut buf).unwrap();
        codec
            .encode(Message::new(MessageKind::Heartbeat, "CLIENT_1"), &mut buf)
            .unwrap();

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.kind(), MessageKind::ScreenData);
        assert_eq!(second.kind(), MessageKind::Heartbeat);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_zero_length_rejected() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidFrameLength { length: 0, .. })
        ));
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidFrameLength { length: -1, .. })
        ));
    }

    #[test]
    fn test_oversized_length_rejected_before_body() {
        let mut codec = MessageCodec::with_max_frame_size(128);
        let mut buf = BytesMut::new();
        buf.put_i32(129);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidFrameLength { length: 129, max: 128 })
        ));
    }

    #[test]
    fn test_bad_magic_in_stream() {
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::new();
        buf.put_i32(8);
        buf.put_u32(0xDEAD_BEEF);
        buf.put_i32(3);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::BadMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut codec = MessageCodec::with_max_frame_size(16);
        let msg = Message::with_payload(MessageKind::ScreenData, "A", vec![0u8; 17]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(msg, &mut buf),
            Err(ProtocolError::PayloadTooLarge { size: 17, max: 16 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_rejects_oversized_frame() {
        let mut codec = MessageCodec::with_max_frame_size(32);
        // 24 fixed bytes + 1 sender byte + 8 payload bytes = 33
        let msg = Message::with_payload(MessageKind::ScreenData, "A", vec![0u8; 8]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(msg, &mut buf),
            Err(ProtocolError::FrameTooLarge { size: 33, max: 32 })
        ));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_framed_stream_roundtrip() {
        use futures::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let (client, server) = tokio::io::duplex(4096);
        let mut writer = FramedWrite::new(client, MessageCodec::new());
        let mut reader = FramedRead::new(server, MessageCodec::new());

        writer.send(screen_data(&[0x01, 0x02, 0x03])).await.unwrap();
        writer
            .send(Message::new(MessageKind::Disconnect, "CLIENT_1"))
            .await
            .unwrap();

        let first = reader.next().await.unwrap().unwrap();
        let second = reader.next().await.unwrap().unwrap();
        assert_eq!(first.payload().as_ref(), &[0x01, 0x02, 0x03]);
        assert_eq!(second.kind(), MessageKind::Disconnect);
    }
}
