//! Serializes frames onto the outbound transport.

use std::{
    io,
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use log::warn;
use tokio::sync::{Mutex, broadcast};

use super::{DisconnectOrigin, DisconnectedEvent, EVENT_CAPACITY, PayloadError};
use crate::{
    header::{self, Header, MAX_HEADER_LENGTH},
    metrics::{self, Direction},
    transport::TransportSender,
};

struct SenderShared {
    transport: Mutex<Option<Box<dyn TransportSender>>>,
    connected: AtomicBool,
    events: broadcast::Sender<DisconnectedEvent>,
    chunk_length: usize,
}

impl SenderShared {
    async fn write_frame(
        &self,
        id: uuid::Uuid,
        prefix: [u8; MAX_HEADER_LENGTH],
        payload: Bytes,
    ) -> Result<(), PayloadError> {
        let mut slot = self.transport.lock().await;
        let Some(transport) = slot.as_mut() else {
            return Err(PayloadError::NotConnected);
        };
        let written = write_frame(transport.as_mut(), &prefix, &payload, self.chunk_length).await;
        if let Err(error) = written {
            warn!("frame write failed: id={id}, error={error}");
            metrics::inc_errors();
            let transport = slot.take();
            drop(slot);
            self.shut_down(transport, format!("send failed: {error}"))
                .await;
            return Err(error.into());
        }
        Ok(())
    }

    async fn shut_down(&self, transport: Option<Box<dyn TransportSender>>, reason: String) {
        if let Some(mut transport) = transport {
            transport.close().await;
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(DisconnectedEvent {
                origin: DisconnectOrigin::Sender,
                reason,
            });
        }
    }
}

/// Writes frames to a [`TransportSender`].
///
/// A frame's header and payload are written under one lock, so concurrent
/// senders never interleave bytes within a frame. Clones share the same
/// transport.
#[derive(Clone)]
pub struct PayloadSender {
    shared: Arc<SenderShared>,
}

impl PayloadSender {
    /// Create a disconnected sender writing at most `chunk_length` bytes per
    /// transport call.
    #[must_use]
    pub fn new(chunk_length: NonZeroUsize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(SenderShared {
                transport: Mutex::new(None),
                connected: AtomicBool::new(false),
                events,
                chunk_length: chunk_length.get(),
            }),
        }
    }

    /// Attach `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::AlreadyConnected`] if a transport is attached.
    pub async fn connect(&self, transport: Box<dyn TransportSender>) -> Result<(), PayloadError> {
        let mut slot = self.shared.transport.lock().await;
        if slot.is_some() {
            return Err(PayloadError::AlreadyConnected);
        }
        *slot = Some(transport);
        self.shared.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.shared.connected.load(Ordering::SeqCst) }

    /// Receive a [`DisconnectedEvent`] whenever this sender disconnects.
    #[must_use]
    pub fn subscribe_disconnected(&self) -> broadcast::Receiver<DisconnectedEvent> {
        self.shared.events.subscribe()
    }

    /// Write one frame: the encoded header followed by `payload`.
    ///
    /// A failed write detaches the transport and raises the disconnect event.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::LengthMismatch`] when `payload` disagrees with
    /// the header, [`PayloadError::NotConnected`] without a transport, or the
    /// transport's I/O error.
    pub async fn send_payload(&self, header: &Header, payload: &[u8]) -> Result<(), PayloadError> {
        if payload.len() != header.payload_length() {
            return Err(PayloadError::LengthMismatch {
                declared: header.payload_length(),
                actual: payload.len(),
            });
        }
        let mut prefix = [0u8; MAX_HEADER_LENGTH];
        header::serialize(header, &mut prefix)?;

        // The write runs on its own task so a dropped caller cannot leave a
        // partial frame on the wire.
        let shared = Arc::clone(&self.shared);
        let payload = Bytes::copy_from_slice(payload);
        let id = header.id();
        tokio::spawn(async move { shared.write_frame(id, prefix, payload).await })
            .await
            .map_err(|error| PayloadError::Io(io::Error::other(error)))??;

        metrics::inc_frames(Direction::Outbound);
        tracing::trace!(
            id = %header.id(),
            payload_type = %header.payload_type(),
            length = header.payload_length(),
            end = header.end(),
            "frame sent"
        );
        Ok(())
    }

    /// Close the transport. Raises the disconnect event the first time it is
    /// called for a connected sender.
    pub async fn disconnect(&self, reason: impl Into<String>) {
        let transport = self.shared.transport.lock().await.take();
        self.shared.shut_down(transport, reason.into()).await;
    }
}

impl std::fmt::Debug for PayloadSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSender")
            .field("connected", &self.is_connected())
            .field("chunk_length", &self.shared.chunk_length)
            .finish_non_exhaustive()
    }
}

async fn write_frame(
    transport: &mut dyn TransportSender,
    prefix: &[u8],
    payload: &[u8],
    chunk_length: usize,
) -> io::Result<()> {
    write_all(transport, prefix).await?;
    for chunk in payload.chunks(chunk_length) {
        write_all(transport, chunk).await?;
    }
    Ok(())
}

async fn write_all(transport: &mut dyn TransportSender, mut buffer: &[u8]) -> io::Result<()> {
    while !buffer.is_empty() {
        let written = transport.send(buffer).await?;
        if written == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "transport accepted no bytes"));
        }
        buffer = &buffer[written..];
    }
    Ok(())
}
