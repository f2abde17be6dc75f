//! Routes inbound frames to assemblers and dispatches completed envelopes.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Mutex, MutexGuard},
};

use log::{debug, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{AssemblerInit, PayloadAssembler};
use crate::{
    header::{Header, PayloadType},
    message::{ReceiveRequest, ReceiveResponse, RequestPayload, ResponsePayload, StreamDescription, strip_bom},
    payload::FrameHandler,
    stream::{ContentStream, StreamManager},
};

/// How many completed envelope keys are remembered to reject repeats.
const COMPLETED_HISTORY: usize = 256;

/// Message produced from inbound frames, consumed by the protocol adapter.
#[derive(Debug)]
pub enum InboundEvent {
    Request { id: Uuid, request: ReceiveRequest },
    Response { id: Uuid, response: ReceiveResponse },
    /// The peer stopped reading the outbound stream with this id.
    CancelStream(Uuid),
    /// The peer abandoned every stream of the connection.
    CancelAll,
}

type EnvelopeKey = (PayloadType, Uuid);

#[derive(Default)]
struct EnvelopeTable {
    active: HashMap<EnvelopeKey, PayloadAssembler>,
    completed: VecDeque<EnvelopeKey>,
}

impl EnvelopeTable {
    fn complete(&mut self, key: EnvelopeKey) -> Option<PayloadAssembler> {
        let assembler = self.active.remove(&key)?;
        if self.completed.len() == COMPLETED_HISTORY {
            self.completed.pop_front();
        }
        self.completed.push_back(key);
        Some(assembler)
    }
}

/// Frame handler for one connection's inbound side.
///
/// Stream frames are delegated to the [`StreamManager`]. Request and response
/// frames are buffered until their final frame, then parsed, their stream
/// descriptors bound to content streams, and the result emitted as an
/// [`InboundEvent`]. Each envelope id completes at most once; later frames
/// reusing a completed id are ignored.
pub struct AssemblerManager {
    streams: StreamManager,
    envelopes: Mutex<EnvelopeTable>,
    events: mpsc::UnboundedSender<InboundEvent>,
}

impl AssemblerManager {
    #[must_use]
    pub fn new(streams: StreamManager, events: mpsc::UnboundedSender<InboundEvent>) -> Self {
        Self {
            streams,
            envelopes: Mutex::new(EnvelopeTable::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EnvelopeTable> {
        self.envelopes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of envelopes still being received.
    #[must_use]
    pub fn pending_envelopes(&self) -> usize { self.lock().active.len() }

    /// Drop every partially received envelope and forget completed ids.
    /// Called when the transport goes away so a later connection starts
    /// clean. Returns how many envelopes were dropped.
    pub fn reset(&self) -> usize {
        let mut table = self.lock();
        let dropped = table.active.len();
        for (_, assembler) in table.active.drain() {
            assembler.stream().abort();
        }
        table.completed.clear();
        dropped
    }

    /// Find or create the assembler for an envelope frame. Returns `None`
    /// when the id already completed.
    fn envelope_stream(&self, header: &Header) -> Option<ContentStream> {
        let key = (header.payload_type(), header.id());
        let mut table = self.lock();
        if table.completed.contains(&key) {
            debug!(
                "frame for completed envelope ignored: type={}, id={}",
                header.payload_type(),
                header.id()
            );
            return None;
        }
        let assembler = table.active.entry(key).or_insert_with(|| {
            PayloadAssembler::new(AssemblerInit::ByHeader(*header), ContentStream::new(header.id()))
        });
        Some(assembler.stream().clone())
    }

    fn on_envelope_frame(&self, header: &Header, received: usize) {
        let key = (header.payload_type(), header.id());
        let completed = {
            let mut table = self.lock();
            let Some(assembler) = table.active.get_mut(&key) else {
                return;
            };
            if !assembler.on_receive(header, received) {
                return;
            }
            table.complete(key)
        };
        if let Some(assembler) = completed {
            self.process_envelope(header.payload_type(), header.id(), &assembler.stream().snapshot());
        }
    }

    fn process_envelope(&self, payload_type: PayloadType, id: Uuid, body: &[u8]) {
        let body = strip_bom(body);
        let event = match payload_type {
            PayloadType::Request => match serde_json::from_slice::<RequestPayload>(body) {
                Ok(payload) => InboundEvent::Request {
                    id,
                    request: ReceiveRequest {
                        verb: payload.verb,
                        path: payload.path,
                        streams: self.claim_streams(&payload.streams),
                    },
                },
                Err(error) => return self.reject_envelope(payload_type, id, &error),
            },
            PayloadType::Response => match serde_json::from_slice::<ResponsePayload>(body) {
                Ok(payload) => InboundEvent::Response {
                    id,
                    response: ReceiveResponse {
                        status_code: payload.status_code,
                        streams: self.claim_streams(&payload.streams),
                    },
                },
                Err(error) => return self.reject_envelope(payload_type, id, &error),
            },
            _ => return,
        };
        tracing::debug!(%id, payload_type = %payload_type, "envelope assembled");
        self.emit(event);
    }

    fn claim_streams(&self, descriptions: &[StreamDescription]) -> Vec<ContentStream> {
        descriptions
            .iter()
            .map(|description| self.streams.claim_stream(description))
            .collect()
    }

    fn reject_envelope(&self, payload_type: PayloadType, id: Uuid, error: &serde_json::Error) {
        warn!("dropping malformed envelope: type={payload_type}, id={id}, error={error}");
        crate::metrics::inc_errors();
    }

    fn emit(&self, event: InboundEvent) {
        if self.events.send(event).is_err() {
            debug!("inbound event dropped: adapter no longer listening");
        }
    }
}

impl FrameHandler for AssemblerManager {
    fn get_payload_stream(&self, header: &Header) -> Option<ContentStream> {
        match header.payload_type() {
            PayloadType::Stream => self.streams.get_payload_stream(header),
            PayloadType::Request | PayloadType::Response => self.envelope_stream(header),
            PayloadType::CancelStream | PayloadType::CancelAll => None,
        }
    }

    fn on_frame_received(&self, header: &Header, received: usize) {
        match header.payload_type() {
            PayloadType::Stream => self.streams.on_receive(header, received),
            PayloadType::Request | PayloadType::Response => self.on_envelope_frame(header, received),
            PayloadType::CancelStream => self.emit(InboundEvent::CancelStream(header.id())),
            PayloadType::CancelAll => {
                let aborted = self.streams.abort_all();
                debug!("cancel all received: aborted_streams={aborted}");
                self.emit(InboundEvent::CancelAll);
            }
        }
    }
}

impl std::fmt::Debug for AssemblerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblerManager")
            .field("streams", &self.streams)
            .field("pending_envelopes", &self.pending_envelopes())
            .finish_non_exhaustive()
    }
}
