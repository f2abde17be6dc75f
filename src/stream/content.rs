//! Appendable byte buffer shared between the receive loop and consumers.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::manager::ManagerShared;

/// Lifecycle of a [`ContentStream`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    /// Bytes may still arrive.
    Open,
    /// The producer sent its final frame.
    Ended,
    /// The consumer cancelled or the connection dropped before the end.
    Cancelled,
}

/// Notification delivered to [`ContentStream::subscribe`] receivers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// New bytes were appended; `total` is the cumulative length.
    Data { chunk: Bytes, total: usize },
    /// The producer finished; no more data follows.
    End { total: usize },
    /// The stream was abandoned before the producer finished.
    Cancelled { total: usize },
}

#[derive(Debug)]
struct StreamBuffer {
    data: BytesMut,
    status: StreamStatus,
    content_type: Option<String>,
    content_length: Option<usize>,
    subscribers: Vec<mpsc::UnboundedSender<StreamEvent>>,
}

impl StreamBuffer {
    fn broadcast(&mut self, event: &StreamEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[derive(Debug)]
struct StreamShared {
    id: Uuid,
    buffer: Mutex<StreamBuffer>,
    status: watch::Sender<StreamStatus>,
    manager: Option<Weak<ManagerShared>>,
}

/// Ordered, appendable byte buffer for one inbound attachment.
///
/// Clones share the same buffer. Consumers either wait for the whole body
/// with [`read_to_end`](Self::read_to_end) or observe it progressively through
/// [`subscribe`](Self::subscribe).
///
/// # Examples
///
/// ```
/// use streamframe::stream::ContentStream;
/// use uuid::Uuid;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stream = ContentStream::new(Uuid::new_v4());
/// stream.append(b"hello ");
/// stream.append(b"world");
/// stream.finish();
/// assert_eq!(stream.read_as_string().await.expect("utf-8 body"), "hello world");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ContentStream {
    shared: Arc<StreamShared>,
}

impl ContentStream {
    /// Create a detached stream not tracked by any manager.
    #[must_use]
    pub fn new(id: Uuid) -> Self { Self::with_manager(id, None) }

    pub(super) fn with_manager(id: Uuid, manager: Option<Weak<ManagerShared>>) -> Self {
        let (status, _) = watch::channel(StreamStatus::Open);
        Self {
            shared: Arc::new(StreamShared {
                id,
                buffer: Mutex::new(StreamBuffer {
                    data: BytesMut::new(),
                    status: StreamStatus::Open,
                    content_type: None,
                    content_length: None,
                    subscribers: Vec::new(),
                }),
                status,
                manager,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamBuffer> {
        self.shared
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Stream id as referenced by envelope descriptors.
    #[must_use]
    pub fn id(&self) -> Uuid { self.shared.id }

    /// Declared content type, once a descriptor has named it.
    #[must_use]
    pub fn content_type(&self) -> Option<String> { self.lock().content_type.clone() }

    /// Declared total length, if the producer announced one.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> { self.lock().content_length }

    pub(crate) fn describe(&self, content_type: Option<String>, content_length: Option<usize>) {
        let mut buffer = self.lock();
        if content_type.is_some() {
            buffer.content_type = content_type;
        }
        if content_length.is_some() {
            buffer.content_length = content_length;
        }
    }

    /// Number of bytes received so far.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().data.len() }

    /// Whether no bytes have been received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> StreamStatus { self.lock().status }

    /// Whether the producer's final frame has been observed and the declared
    /// length, if any, has been reached.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let buffer = self.lock();
        buffer.status == StreamStatus::Ended
            && buffer
                .content_length
                .is_none_or(|declared| buffer.data.len() >= declared)
    }

    /// Append bytes and notify subscribers. Ignored once the stream is no
    /// longer open.
    pub fn append(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut buffer = self.lock();
        if buffer.status != StreamStatus::Open {
            return;
        }
        buffer.data.extend_from_slice(chunk);
        let event = StreamEvent::Data {
            chunk: Bytes::copy_from_slice(chunk),
            total: buffer.data.len(),
        };
        buffer.broadcast(&event);
    }

    /// Mark the stream as fully produced.
    pub fn finish(&self) { self.transition(StreamStatus::Ended); }

    pub(crate) fn abort(&self) { self.transition(StreamStatus::Cancelled); }

    fn transition(&self, next: StreamStatus) {
        let mut buffer = self.lock();
        if buffer.status != StreamStatus::Open {
            return;
        }
        buffer.status = next;
        let total = buffer.data.len();
        let event = match next {
            StreamStatus::Ended => StreamEvent::End { total },
            _ => StreamEvent::Cancelled { total },
        };
        buffer.broadcast(&event);
        buffer.subscribers.clear();
        drop(buffer);
        self.shared.status.send_replace(next);
    }

    /// Stop receiving this stream.
    ///
    /// The owning [`StreamManager`](super::StreamManager) forgets the stream
    /// and, if it was not fully received, asks the peer to stop sending it.
    /// Bytes received so far remain readable.
    pub fn cancel(&self) {
        if let Some(manager) = self.shared.manager.as_ref().and_then(Weak::upgrade) {
            super::StreamManager::from_shared(manager).close_stream(self.id());
        }
        self.abort();
    }

    /// Subscribe to progress notifications.
    ///
    /// Bytes already buffered are replayed as a single
    /// [`StreamEvent::Data`] so the cumulative totals observed by the
    /// subscriber always increase.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut buffer = self.lock();
        let total = buffer.data.len();
        if total > 0 {
            let _ = tx.send(StreamEvent::Data {
                chunk: Bytes::copy_from_slice(&buffer.data),
                total,
            });
        }
        match buffer.status {
            StreamStatus::Open => buffer.subscribers.push(tx),
            StreamStatus::Ended => {
                let _ = tx.send(StreamEvent::End { total });
            }
            StreamStatus::Cancelled => {
                let _ = tx.send(StreamEvent::Cancelled { total });
            }
        }
        rx
    }

    /// Snapshot of the bytes received so far.
    #[must_use]
    pub fn snapshot(&self) -> Bytes { Bytes::copy_from_slice(&self.lock().data) }

    /// Wait until the stream ends or is cancelled, then return its bytes.
    ///
    /// A cancelled stream yields whatever arrived before cancellation.
    pub async fn read_to_end(&self) -> Bytes {
        let mut status = self.shared.status.subscribe();
        // The sender lives as long as `self`, so waiting cannot fail.
        let _ = status.wait_for(|state| *state != StreamStatus::Open).await;
        self.snapshot()
    }

    /// Read the whole body as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the UTF-8 error when the body is not valid text.
    pub async fn read_as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.read_to_end().await.to_vec())
    }

    /// Read the whole body and decode it as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when decoding fails.
    pub async fn read_as_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let body = self.read_to_end().await;
        serde_json::from_slice(crate::message::strip_bom(&body))
    }
}
