//! In-memory and faulty transports.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use streamframe::transport::{StreamReceiver, StreamSender, TransportPair, TransportReceiver, TransportSender};

/// Two connected transport pairs backed by `tokio::io::duplex`.
///
/// Bytes sent on the first pair arrive on the second and vice versa.
pub fn duplex_pair(capacity: usize) -> (TransportPair, TransportPair) {
    let (a, b) = tokio::io::duplex(capacity);
    (split(a), split(b))
}

fn split(io: tokio::io::DuplexStream) -> TransportPair {
    let (read, write) = tokio::io::split(io);
    (
        Box::new(StreamSender::new(write)),
        Box::new(StreamReceiver::new(read)),
    )
}

/// Receiver that serves canned bytes at most `max_read` at a time and then
/// reports end of stream.
pub struct ChunkedReceiver {
    data: Bytes,
    max_read: usize,
}

impl ChunkedReceiver {
    pub fn new(data: impl Into<Bytes>, max_read: usize) -> Self {
        Self {
            data: data.into(),
            max_read: max_read.max(1),
        }
    }
}

#[async_trait]
impl TransportReceiver for ChunkedReceiver {
    fn is_connected(&self) -> bool { !self.data.is_empty() }

    async fn receive(&mut self, count: usize) -> io::Result<Bytes> {
        if self.data.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more data"));
        }
        let take = count.min(self.max_read).min(self.data.len());
        Ok(self.data.split_to(take))
    }

    async fn close(&mut self) { self.data.clear(); }
}

/// Sender whose writes always fail with `BrokenPipe`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSender;

#[async_trait]
impl TransportSender for FailingSender {
    fn is_connected(&self) -> bool { false }

    async fn send(&mut self, _buffer: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    async fn close(&mut self) {}
}
