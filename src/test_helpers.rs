#![cfg(test)]
//! Test-only transports and frame handlers shared by unit tests.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::{
    header::{self, Header, MAX_HEADER_LENGTH},
    payload::FrameHandler,
    stream::ContentStream,
    transport::{TransportReceiver, TransportSender},
};

/// Sender that records each `send` call separately.
#[derive(Clone, Default)]
pub struct RecordingSender {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingSender {
    pub fn writes(&self) -> Vec<Vec<u8>> { self.writes.lock().expect("writes lock").clone() }

    pub fn bytes(&self) -> Vec<u8> { self.writes().concat() }
}

#[async_trait]
impl TransportSender for RecordingSender {
    fn is_connected(&self) -> bool { true }

    async fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        self.writes.lock().expect("writes lock").push(buffer.to_vec());
        Ok(buffer.len())
    }

    async fn close(&mut self) {}
}

/// Sender whose every write fails with `BrokenPipe`.
#[derive(Default)]
pub struct FailingSender;

#[async_trait]
impl TransportSender for FailingSender {
    fn is_connected(&self) -> bool { false }

    async fn send(&mut self, _buffer: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"))
    }

    async fn close(&mut self) {}
}

/// Receiver that serves canned bytes at most `max_read` at a time, then
/// reports EOF.
pub struct ChunkedReceiver {
    data: Bytes,
    max_read: usize,
}

impl ChunkedReceiver {
    pub fn new(data: impl Into<Bytes>, max_read: usize) -> Self {
        Self {
            data: data.into(),
            max_read,
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

    async fn close(&mut self) {}
}

/// Encode one frame as it appears on the wire.
pub fn encode_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut prefix = [0u8; MAX_HEADER_LENGTH];
    header::serialize(header, &mut prefix).expect("encode header");
    let mut frame = prefix.to_vec();
    frame.extend_from_slice(payload);
    frame
}

/// Frame handler that buffers every payload and records progress reports.
#[derive(Default)]
pub struct RecordingHandler {
    streams: Mutex<HashMap<Uuid, ContentStream>>,
    reports: Mutex<Vec<(Header, usize)>>,
}

impl RecordingHandler {
    pub fn reports(&self) -> Vec<(Header, usize)> { self.reports.lock().expect("reports lock").clone() }

    pub fn stream(&self, id: Uuid) -> Option<ContentStream> {
        self.streams.lock().expect("streams lock").get(&id).cloned()
    }
}

impl FrameHandler for RecordingHandler {
    fn get_payload_stream(&self, header: &Header) -> Option<ContentStream> {
        Some(
            self.streams
                .lock()
                .expect("streams lock")
                .entry(header.id())
                .or_insert_with(|| ContentStream::new(header.id()))
                .clone(),
        )
    }

    fn on_frame_received(&self, header: &Header, received: usize) {
        self.reports
            .lock()
            .expect("reports lock")
            .push((*header, received));
    }
}

/// One side of an in-memory connection with its protocol adapter.
pub struct TestPeer {
    pub adapter: crate::protocol::ProtocolAdapter,
    pub sender: crate::payload::PayloadSender,
    pub receiver: crate::payload::PayloadReceiver,
}

async fn connect_peer(
    handler: Arc<dyn crate::protocol::RequestHandler>,
    config: &crate::config::StreamingConfig,
    io: tokio::io::DuplexStream,
) -> TestPeer {
    use crate::{
        payload::{PayloadReceiver, PayloadSender},
        protocol::{ProtocolAdapter, RequestManager},
        transport::{StreamReceiver, StreamSender},
    };

    let (read, write) = tokio::io::split(io);
    let sender = PayloadSender::new(config.chunk_length());
    let receiver = PayloadReceiver::new(config.chunk_length());
    let adapter = ProtocolAdapter::new(handler, RequestManager::new(), sender.clone(), &receiver, config);
    sender
        .connect(Box::new(StreamSender::new(write)))
        .await
        .expect("connect sender");
    receiver
        .connect(Box::new(StreamReceiver::new(read)))
        .expect("connect receiver");
    TestPeer {
        adapter,
        sender,
        receiver,
    }
}

/// Two peers joined by an in-memory duplex pipe.
pub async fn peer_pair(
    client: Arc<dyn crate::protocol::RequestHandler>,
    server: Arc<dyn crate::protocol::RequestHandler>,
    config: &crate::config::StreamingConfig,
) -> (TestPeer, TestPeer) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    (
        connect_peer(client, config, client_io).await,
        connect_peer(server, config, server_io).await,
    )
}
