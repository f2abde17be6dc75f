//! Transport halves over tokio byte streams.

use std::io;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{TransportReceiver, TransportSender, closed_error};

/// [`TransportSender`] writing to an `AsyncWrite`.
#[derive(Debug)]
pub struct StreamSender<W> {
    writer: Option<W>,
}

impl<W> StreamSender<W> {
    /// Wrap a connected writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

#[async_trait]
impl<W> TransportSender for StreamSender<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn is_connected(&self) -> bool { self.writer.is_some() }

    async fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| closed_error("stream sender"))?;
        writer.write_all(buffer).await?;
        writer.flush().await?;
        Ok(buffer.len())
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.shutdown().await
        {
            log::debug!("stream sender shutdown failed: error={e}");
        }
    }
}

/// [`TransportReceiver`] reading from an `AsyncRead`.
#[derive(Debug)]
pub struct StreamReceiver<R> {
    reader: Option<R>,
}

impl<R> StreamReceiver<R> {
    /// Wrap a connected reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

#[async_trait]
impl<R> TransportReceiver for StreamReceiver<R>
where
    R: AsyncRead + Unpin + Send,
{
    fn is_connected(&self) -> bool { self.reader.is_some() }

    async fn receive(&mut self, count: usize) -> io::Result<Bytes> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| closed_error("stream receiver"))?;
        let mut buffer = BytesMut::zeroed(count);
        let read = reader.read(&mut buffer).await?;
        if read == 0 && count > 0 {
            self.reader = None;
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "peer closed the stream",
            ));
        }
        buffer.truncate(read);
        Ok(buffer.freeze())
    }

    async fn close(&mut self) { self.reader = None; }
}
