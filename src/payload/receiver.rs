//! Receive loop that parses frames from the inbound transport.

use std::{
    convert::Infallible,
    io,
    num::NonZeroUsize,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::BytesMut;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{DisconnectOrigin, DisconnectedEvent, EVENT_CAPACITY, PayloadError};
use crate::{
    header::{self, Header, MAX_HEADER_LENGTH, PayloadType},
    metrics::{self, Direction},
    stream::ContentStream,
    transport::TransportReceiver,
};

/// Consumer of parsed frames.
///
/// For every frame the receiver first asks for the stream its payload should
/// be appended to, then reports progress. Stream frames are reported after
/// every chunk read; all other frames are reported once, after the whole
/// payload has been read. Frames with an empty payload are still reported.
pub trait FrameHandler: Send + Sync {
    /// Stream the payload of `header` is appended to, or `None` to discard it.
    fn get_payload_stream(&self, header: &Header) -> Option<ContentStream>;

    /// `received` bytes of the frame described by `header` have been read.
    fn on_frame_received(&self, header: &Header, received: usize);
}

struct ReceiverShared {
    handler: RwLock<Option<Arc<dyn FrameHandler>>>,
    session: Mutex<Option<CancellationToken>>,
    connected: AtomicBool,
    events: broadcast::Sender<DisconnectedEvent>,
    chunk_length: usize,
}

impl ReceiverShared {
    fn session(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn handler(&self) -> Option<Arc<dyn FrameHandler>> {
        self.handler
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn shut_down(&self, reason: String) {
        if let Some(token) = self.session().take() {
            token.cancel();
        }
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(DisconnectedEvent {
                origin: DisconnectOrigin::Receiver,
                reason,
            });
        }
    }
}

/// Reads frames from a [`TransportReceiver`] on a background task.
///
/// Clones share the same session. Requires a Tokio runtime when connecting.
#[derive(Clone)]
pub struct PayloadReceiver {
    shared: Arc<ReceiverShared>,
}

impl PayloadReceiver {
    /// Create a disconnected receiver requesting at most `chunk_length`
    /// bytes per transport read.
    #[must_use]
    pub fn new(chunk_length: NonZeroUsize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(ReceiverShared {
                handler: RwLock::new(None),
                session: Mutex::new(None),
                connected: AtomicBool::new(false),
                events,
                chunk_length: chunk_length.get(),
            }),
        }
    }

    /// Route parsed frames to `handler`, replacing any previous handler.
    pub fn subscribe(&self, handler: Arc<dyn FrameHandler>) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handler);
    }

    /// Start the receive loop over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::AlreadyConnected`] while a previous session is
    /// still running.
    pub fn connect(&self, transport: Box<dyn TransportReceiver>) -> Result<(), PayloadError> {
        let token = {
            let mut session = self.shared.session();
            if session.is_some() {
                return Err(PayloadError::AlreadyConnected);
            }
            let token = CancellationToken::new();
            *session = Some(token.clone());
            token
        };
        self.shared.connected.store(true, Ordering::SeqCst);
        tokio::spawn(receive_loop(Arc::clone(&self.shared), transport, token));
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.shared.connected.load(Ordering::SeqCst) }

    /// Receive a [`DisconnectedEvent`] whenever this receiver disconnects.
    #[must_use]
    pub fn subscribe_disconnected(&self) -> broadcast::Receiver<DisconnectedEvent> {
        self.shared.events.subscribe()
    }

    /// Stop the receive loop. The loop closes the transport as it exits.
    pub fn disconnect(&self, reason: impl Into<String>) { self.shared.shut_down(reason.into()); }
}

impl std::fmt::Debug for PayloadReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadReceiver")
            .field("connected", &self.is_connected())
            .field("chunk_length", &self.shared.chunk_length)
            .finish_non_exhaustive()
    }
}

async fn receive_loop(
    shared: Arc<ReceiverShared>,
    mut transport: Box<dyn TransportReceiver>,
    token: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        () = token.cancelled() => None,
        result = read_frames(&shared, transport.as_mut()) => Some(result),
    };
    transport.close().await;

    if let Some(Err(error)) = outcome
        && !token.is_cancelled()
    {
        if is_clean_close(&error) {
            debug!("transport closed by peer");
        } else {
            warn!("receive loop failed: error={error}");
            metrics::inc_errors();
        }
        shared.shut_down(format!("receive failed: {error}"));
    }
}

fn is_clean_close(error: &PayloadError) -> bool {
    matches!(error, PayloadError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof)
}

async fn read_frames(
    shared: &ReceiverShared,
    transport: &mut dyn TransportReceiver,
) -> Result<Infallible, PayloadError> {
    let mut prefix = BytesMut::with_capacity(MAX_HEADER_LENGTH);
    loop {
        prefix.clear();
        read_exact(transport, &mut prefix, MAX_HEADER_LENGTH).await?;
        let header = header::deserialize(&prefix)?;
        metrics::inc_frames(Direction::Inbound);
        tracing::trace!(
            id = %header.id(),
            payload_type = %header.payload_type(),
            length = header.payload_length(),
            end = header.end(),
            "frame received"
        );
        let handler = shared.handler();
        read_payload(&header, handler.as_deref(), transport, shared.chunk_length).await?;
    }
}

async fn read_exact(
    transport: &mut dyn TransportReceiver,
    buffer: &mut BytesMut,
    count: usize,
) -> Result<(), PayloadError> {
    while buffer.len() < count {
        let chunk = transport.receive(count - buffer.len()).await?;
        if chunk.is_empty() {
            return Err(unexpected_eof().into());
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(())
}

async fn read_payload(
    header: &Header,
    handler: Option<&dyn FrameHandler>,
    transport: &mut dyn TransportReceiver,
    chunk_length: usize,
) -> Result<(), PayloadError> {
    let stream = handler.and_then(|handler| handler.get_payload_stream(header));
    let progressive = header.payload_type() == PayloadType::Stream;
    let length = header.payload_length();
    let mut received = 0;

    while received < length {
        let chunk = transport.receive((length - received).min(chunk_length)).await?;
        if chunk.is_empty() {
            return Err(unexpected_eof().into());
        }
        received += chunk.len();
        if let Some(stream) = &stream {
            stream.append(&chunk);
        }
        if progressive && let Some(handler) = handler {
            handler.on_frame_received(header, received);
        }
    }

    if (!progressive || length == 0)
        && let Some(handler) = handler
    {
        handler.on_frame_received(header, received);
    }
    Ok(())
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "transport closed mid-frame")
}
