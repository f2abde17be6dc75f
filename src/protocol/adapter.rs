//! Glue between the payload layer and request/response semantics.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use super::{ProtocolError, RequestHandler, RequestManager};
use crate::{
    assembler::{AssemblerManager, InboundEvent},
    config::StreamingConfig,
    header::PayloadType,
    message::{
        HttpContent,
        ReceiveRequest,
        ReceiveResponse,
        RequestPayload,
        ResponsePayload,
        StreamDescription,
        StreamingRequest,
        StreamingResponse,
    },
    payload::{Disassembler, FrameHandler, PayloadError, PayloadReceiver, PayloadSender, SendOutcome},
    stream::StreamManager,
};

type OutboundStreams = DashMap<Uuid, Arc<AtomicBool>>;

struct AdapterShared {
    handler: Arc<dyn RequestHandler>,
    requests: RequestManager,
    sender: PayloadSender,
    streams: StreamManager,
    assembler: Arc<AssemblerManager>,
    disassembler: Disassembler,
    outbound: OutboundStreams,
    shutdown: CancellationToken,
}

/// Drives one connection's request/response traffic.
///
/// Creating an adapter subscribes it to the receiver and spawns its dispatch
/// tasks, so it must be created inside a Tokio runtime. The tasks stop when
/// the adapter is dropped.
pub struct ProtocolAdapter {
    shared: Arc<AdapterShared>,
    _shutdown: DropGuard,
}

static_assertions::assert_impl_all!(ProtocolAdapter: Send, Sync);

impl ProtocolAdapter {
    /// Wire `handler` to the given payload halves.
    #[must_use]
    pub fn new(
        handler: Arc<dyn RequestHandler>,
        requests: RequestManager,
        sender: PayloadSender,
        receiver: &PayloadReceiver,
        config: &StreamingConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
        let streams = StreamManager::new(move |id| {
            let _ = cancel_tx.send(id);
        });
        let assembler = Arc::new(AssemblerManager::new(streams.clone(), event_tx));
        receiver.subscribe(Arc::clone(&assembler) as Arc<dyn FrameHandler>);

        let shutdown = CancellationToken::new();
        let shared = Arc::new(AdapterShared {
            handler,
            requests,
            sender,
            streams,
            assembler,
            disassembler: Disassembler::new(config.max_frame_length()),
            outbound: DashMap::new(),
            shutdown: shutdown.clone(),
        });
        tokio::spawn(dispatch_events(Arc::clone(&shared), event_rx));
        tokio::spawn(send_cancellations(Arc::clone(&shared), cancel_rx));

        Self {
            shared,
            _shutdown: shutdown.drop_guard(),
        }
    }

    #[must_use]
    pub fn request_manager(&self) -> &RequestManager { &self.shared.requests }

    #[must_use]
    pub fn stream_manager(&self) -> &StreamManager { &self.shared.streams }

    /// Send `request` and wait for the peer's response.
    ///
    /// # Errors
    ///
    /// Fails if the envelope cannot be encoded or sent, or the connection
    /// drops before a response arrives.
    pub async fn send_request(&self, request: StreamingRequest) -> Result<ReceiveResponse, ProtocolError> {
        let id = Uuid::new_v4();
        let pending = self.shared.requests.get_response(id)?;
        let (body, attachments) = request_envelope(request)?;
        tracing::debug!(%id, "sending request");
        self.shared
            .send_message(PayloadType::Request, id, body, attachments)
            .await?;

        Ok(pending.await?)
    }

    /// Like [`send_request`](Self::send_request), giving up when `token` is
    /// cancelled. The pending entry is removed either way.
    ///
    /// Cancelling stops only the wait: the request and its attachments are
    /// still sent in full on a background task.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Cancelled`] if `token` fires first, otherwise
    /// the errors of [`send_request`](Self::send_request).
    pub async fn send_request_with_cancellation(
        &self,
        request: StreamingRequest,
        token: CancellationToken,
    ) -> Result<ReceiveResponse, ProtocolError> {
        let id = Uuid::new_v4();
        let pending = self.shared.requests.get_response(id)?;
        let (body, attachments) = request_envelope(request)?;
        tracing::debug!(%id, "sending cancellable request");
        let shared = Arc::clone(&self.shared);
        let send = tokio::spawn(async move {
            shared
                .send_message(PayloadType::Request, id, body, attachments)
                .await
        });
        let response = async {
            send.await
                .map_err(|error| PayloadError::Io(io::Error::other(error)))??;
            Ok::<_, ProtocolError>(pending.await?)
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(ProtocolError::Cancelled),
            result = response => result,
        }
    }

    /// Ask the peer to abandon every stream and abort all inbound streams.
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] raised while sending the cancel frame.
    pub async fn cancel_all(&self) -> Result<(), PayloadError> {
        self.shared.streams.abort_all();
        self.shared
            .disassembler
            .send_cancel_all(&self.shared.sender)
            .await
    }

    /// Abort every inbound stream and stop every outbound one without telling
    /// the peer. Used when the connection is already gone.
    pub fn abort_streams(&self) {
        let aborted = self.shared.streams.abort_all();
        let envelopes = self.shared.assembler.reset();
        self.shared.cancel_outbound_streams();
        debug!("streams aborted: inbound={aborted}, partial_envelopes={envelopes}");
    }

    /// Number of inbound requests and responses still missing frames.
    #[must_use]
    pub fn pending_envelopes(&self) -> usize { self.shared.assembler.pending_envelopes() }
}

impl std::fmt::Debug for ProtocolAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolAdapter")
            .field("requests", &self.shared.requests)
            .field("streams", &self.shared.streams)
            .field("outbound_streams", &self.shared.outbound.len())
            .finish_non_exhaustive()
    }
}

impl AdapterShared {
    fn handle_event(self: &Arc<Self>, event: InboundEvent) {
        match event {
            InboundEvent::Request { id, request } => {
                tokio::spawn(Arc::clone(self).process_request(id, request));
            }
            InboundEvent::Response { id, response } => {
                if !self.requests.signal_response(id, response) {
                    debug!("unmatched response dropped: id={id}");
                }
            }
            InboundEvent::CancelStream(id) => match self.outbound.get(&id) {
                Some(flag) => flag.store(true, Ordering::SeqCst),
                None => debug!("cancel for unknown outbound stream ignored: id={id}"),
            },
            InboundEvent::CancelAll => self.cancel_outbound_streams(),
        }
    }

    fn cancel_outbound_streams(&self) {
        for entry in &self.outbound {
            entry.value().store(true, Ordering::SeqCst);
        }
    }

    async fn process_request(self: Arc<Self>, id: Uuid, request: ReceiveRequest) {
        tracing::debug!(%id, verb = %request.verb, path = %request.path, "dispatching request");
        let Some(response) = self.handler.process_request(request).await else {
            debug!("handler produced no response: id={id}");
            return;
        };
        if let Err(error) = self.send_response(id, response).await {
            warn!("failed to send response: id={id}, error={error}");
        }
    }

    async fn send_response(&self, id: Uuid, response: StreamingResponse) -> Result<(), ProtocolError> {
        let (status_code, contents) = response.into_parts();
        let attachments = assign_stream_ids(contents);
        let body = serde_json::to_vec(&ResponsePayload {
            status_code,
            streams: describe(&attachments),
        })?;
        self.send_message(PayloadType::Response, id, body, attachments)
            .await?;
        Ok(())
    }

    /// Send an envelope followed by its attachments, in descriptor order.
    async fn send_message(
        &self,
        payload_type: PayloadType,
        id: Uuid,
        body: Vec<u8>,
        attachments: Vec<(Uuid, HttpContent)>,
    ) -> Result<(), PayloadError> {
        let registration = OutboundRegistration::new(&self.outbound, &attachments);
        self.disassembler
            .send_envelope(&self.sender, payload_type, id, Bytes::from(body))
            .await?;
        for ((stream_id, content), flag) in attachments.into_iter().zip(registration.flags()) {
            let outcome = self
                .disassembler
                .send_stream(&self.sender, stream_id, content.into_body(), &flag)
                .await?;
            if outcome == SendOutcome::Cancelled {
                debug!("outbound stream cancelled by peer: id={stream_id}");
            }
        }
        Ok(())
    }
}

/// Marks outbound stream ids as cancellable for the duration of a send.
struct OutboundRegistration<'a> {
    table: &'a OutboundStreams,
    entries: Vec<(Uuid, Arc<AtomicBool>)>,
}

impl<'a> OutboundRegistration<'a> {
    fn new(table: &'a OutboundStreams, attachments: &[(Uuid, HttpContent)]) -> Self {
        let entries = attachments
            .iter()
            .map(|(id, _)| {
                let flag = Arc::new(AtomicBool::new(false));
                table.insert(*id, Arc::clone(&flag));
                (*id, flag)
            })
            .collect();
        Self { table, entries }
    }

    fn flags(&self) -> Vec<Arc<AtomicBool>> {
        self.entries
            .iter()
            .map(|(_, flag)| Arc::clone(flag))
            .collect()
    }
}

impl Drop for OutboundRegistration<'_> {
    fn drop(&mut self) {
        for (id, _) in &self.entries {
            self.table.remove(id);
        }
    }
}

fn request_envelope(request: StreamingRequest) -> Result<(Vec<u8>, Vec<(Uuid, HttpContent)>), serde_json::Error> {
    let (verb, path, contents) = request.into_parts();
    let attachments = assign_stream_ids(contents);
    let body = serde_json::to_vec(&RequestPayload {
        verb,
        path,
        streams: describe(&attachments),
    })?;
    Ok((body, attachments))
}

fn assign_stream_ids(contents: Vec<HttpContent>) -> Vec<(Uuid, HttpContent)> {
    contents
        .into_iter()
        .map(|content| (Uuid::new_v4(), content))
        .collect()
}

fn describe(attachments: &[(Uuid, HttpContent)]) -> Vec<StreamDescription> {
    attachments
        .iter()
        .map(|(id, content)| StreamDescription {
            id: *id,
            content_type: Some(content.content_type().to_owned()),
            length: content.length(),
        })
        .collect()
}

async fn dispatch_events(shared: Arc<AdapterShared>, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
    loop {
        tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => shared.handle_event(event),
                None => break,
            },
        }
    }
}

async fn send_cancellations(shared: Arc<AdapterShared>, mut cancels: mpsc::UnboundedReceiver<Uuid>) {
    loop {
        let id = tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            id = cancels.recv() => match id {
                Some(id) => id,
                None => break,
            },
        };
        if !shared.sender.is_connected() {
            continue;
        }
        if let Err(error) = shared
            .disassembler
            .send_cancel_stream(&shared.sender, id)
            .await
        {
            warn!("failed to send stream cancellation: id={id}, error={error}");
        }
    }
}
