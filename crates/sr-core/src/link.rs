//! Framed transport halves shared by relay and client sessions
//!
//! A connection is split into a [`FrameReader`] owned by the session's read
//! loop and a [`FrameWriter`] that any task may use to send. Writes are
//! serialised through a mutex so each frame reaches the wire contiguously.

use futures::SinkExt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};

use sr_protocol::{Message, MessageCodec};

use crate::error::SendError;

type BoxedWrite = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedRead = Box<dyn AsyncRead + Send + Unpin>;

/// Upper bound on flushing buffered frames when a writer is shut down
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Read half of a framed connection
pub type FrameReader = FramedRead<BoxedRead, MessageCodec>;

/// Write half of a framed connection
pub struct FrameWriter {
    inner: Mutex<Option<FramedWrite<BoxedWrite, MessageCodec>>>,
}

impl FrameWriter {
    /// Wrap a raw writer with a codec limited to `max_frame_size` bytes
    pub fn new<W>(writer: W, max_frame_size: usize) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let framed = FramedWrite::new(
            Box::new(writer) as BoxedWrite,
            MessageCodec::with_max_frame_size(max_frame_size),
        );
        Self {
            inner: Mutex::new(Some(framed)),
        }
    }

    /// Encode and flush one message.
    pub async fn send(&self, msg: &Message) -> Result<(), SendError> {
        let mut guard = self.inner.lock().await;
        let writer = guard.as_mut().ok_or(SendError::NotOpen)?;
        writer.send(msg.clone()).await?;
        tracing::trace!("Sent {} ({} bytes payload)", msg.kind(), msg.payload().len());
        Ok(())
    }

    /// Flush and close the underlying writer.
    ///
    /// Returns true for the call that actually closed it; later calls are
    /// no-ops.
    pub async fn shutdown(&self) -> bool {
        let Some(mut writer) = self.inner.lock().await.take() else {
            return false;
        };

        match tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Error closing transport: {}", e),
            Err(_) => tracing::debug!("Timed out flushing transport on close"),
        }
        true
    }
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter").finish_non_exhaustive()
    }
}

/// Split a byte stream into framed read and write halves.
pub fn split_stream<S>(stream: S, max_frame_size: usize) -> (FrameReader, FrameWriter)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let reader = FramedRead::new(
        Box::new(read_half) as BoxedRead,
        MessageCodec::with_max_frame_size(max_frame_size),
    );
    let writer = FrameWriter::new(write_half, max_frame_size);
    (reader, writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use sr_protocol::{MessageKind, DEFAULT_MAX_PAYLOAD_SIZE};

    #[tokio::test]
    async fn test_send_and_receive() {
        let (a, b) = tokio::io::duplex(4096);
        let (_a_reader, a_writer) = split_stream(a, DEFAULT_MAX_PAYLOAD_SIZE);
        let (mut b_reader, _b_writer) = split_stream(b, DEFAULT_MAX_PAYLOAD_SIZE);

        let msg = Message::with_text(MessageKind::ScreenData, "alice", "frame-1");
        a_writer.send(&msg).await.unwrap();

        let received = b_reader.next().await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn test_shutdown_is_once() {
        let (a, b) = tokio::io::duplex(4096);
        let (_reader, writer) = split_stream(a, DEFAULT_MAX_PAYLOAD_SIZE);
        let (mut peer, _peer_writer) = split_stream(b, DEFAULT_MAX_PAYLOAD_SIZE);

        assert!(writer.shutdown().await);
        assert!(!writer.shutdown().await);

        let result = writer
            .send(&Message::new(MessageKind::Heartbeat, "alice"))
            .await;
        assert!(matches!(result, Err(SendError::NotOpen)));

        // Peer observes end of stream
        assert!(peer.next().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_send_is_rejected() {
        let (a, _b) = tokio::io::duplex(4096);
        let (_reader, writer) = split_stream(a, 16);
        let msg = Message::with_payload(MessageKind::ScreenData, "alice", vec![0u8; 64]);
        assert!(matches!(writer.send(&msg).await, Err(SendError::Write(_))));
    }
}
