//! # Transport Layer
//!
//! Byte channels to a gateway and the frame channel built on top of them.
//!
//! ## Components
//! - [`FrameChannel`]: `##`-framed reads and writes over any [`ByteStream`]
//! - [`Connector`]: opens a fresh channel; one per gateway kind
//! - [`tcp::TcpConnector`]: BUS gateways over Ethernet
//! - [`serial::SerialConnector`]: USB ZigBee gateways over a serial port
//!
//! Sessions only see [`Connector`], so tests substitute in-memory streams
//! built with `tokio::io::duplex`.

pub mod serial;
pub mod tcp;

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::core::codec::FrameCodec;
use crate::error::Result;
use crate::utils::timeout::with_timeout_error;

pub use serial::SerialConnector;
pub use tcp::TcpConnector;

/// Any bidirectional byte stream a gateway can be reached through.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

type BoxedStream = Box<dyn ByteStream>;

/// Opens channels to one gateway.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new, unauthenticated channel.
    async fn connect(&self) -> Result<FrameChannel>;

    /// Human readable endpoint, for logs
    fn describe(&self) -> String;
}

/// Reading half of a [`FrameChannel`]
pub struct FrameReader {
    inner: FramedRead<ReadHalf<BoxedStream>, FrameCodec>,
}

impl FrameReader {
    /// Next complete frame; `Ok(None)` on a clean end of stream.
    pub async fn read_frame(&mut self) -> Result<Option<String>> {
        match self.inner.next().await {
            Some(Ok(frame)) => {
                trace!(%frame, "RX");
                Ok(Some(frame))
            }
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Writing half of a [`FrameChannel`]
pub struct FrameWriter {
    inner: FramedWrite<WriteHalf<BoxedStream>, FrameCodec>,
}

impl FrameWriter {
    /// Write one frame and flush it.
    pub async fn write_frame(&mut self, frame: &str) -> Result<()> {
        trace!(%frame, "TX");
        self.inner.send(frame.to_string()).await
    }

    /// Best-effort shutdown of the write side.
    pub async fn close(&mut self) {
        if let Err(e) = self.inner.close().await {
            debug!(error = %e, "Error while closing channel");
        }
    }
}

/// A framed, bidirectional channel to a gateway.
pub struct FrameChannel {
    reader: FrameReader,
    writer: FrameWriter,
}

impl FrameChannel {
    pub fn new<S: ByteStream>(stream: S) -> Self {
        let boxed: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        Self {
            reader: FrameReader {
                inner: FramedRead::new(read_half, FrameCodec),
            },
            writer: FrameWriter {
                inner: FramedWrite::new(write_half, FrameCodec),
            },
        }
    }

    pub async fn write_frame(&mut self, frame: &str) -> Result<()> {
        self.writer.write_frame(frame).await
    }

    pub async fn read_frame(&mut self) -> Result<Option<String>> {
        self.reader.read_frame().await
    }

    /// Read with a deadline; expiry is [`OwnError::Timeout`](crate::error::OwnError::Timeout).
    pub async fn read_frame_timeout(&mut self, limit: Duration) -> Result<Option<String>> {
        with_timeout_error(self.reader.read_frame(), limit).await
    }

    /// A frame that has already arrived, without waiting for more input.
    /// `None` when nothing is ready.
    pub fn try_read_frame(&mut self) -> Option<Result<Option<String>>> {
        self.reader.read_frame().now_or_never()
    }

    pub async fn close(&mut self) {
        self.writer.close().await;
    }

    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        (self.reader, self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OwnError;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_frame_channel_over_duplex() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut channel = FrameChannel::new(client);

        server.write_all(b"*#*1##*1*1*12##").await.unwrap();
        assert_eq!(channel.read_frame().await.unwrap().as_deref(), Some("*#*1##"));
        assert_eq!(channel.read_frame().await.unwrap().as_deref(), Some("*1*1*12##"));

        channel.write_frame("*99*1##").await.unwrap();
        let mut buf = [0u8; 7];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"*99*1##");

        drop(server);
        assert_eq!(channel.read_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_try_read_returns_only_arrived_frames() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut channel = FrameChannel::new(client);
        assert!(channel.try_read_frame().is_none());

        server.write_all(b"*1*0*13##*1*1").await.unwrap();
        let frame = channel.try_read_frame().unwrap().unwrap();
        assert_eq!(frame.as_deref(), Some("*1*0*13##"));
        assert!(channel.try_read_frame().is_none());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (client, _server) = tokio::io::duplex(64);
        let mut channel = FrameChannel::new(client);
        let result = channel.read_frame_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(OwnError::Timeout)));
    }
}
