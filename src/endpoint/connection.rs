//! Connection supervision shared by every endpoint flavour.

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use super::{EndpointError, ReconnectPolicy};
use crate::{
    config::StreamingConfig,
    message::{ReceiveResponse, StreamingRequest},
    metrics,
    payload::{DisconnectedEvent, PayloadReceiver, PayloadSender},
    protocol::{ProtocolAdapter, RequestError, RequestHandler, RequestManager},
    transport::TransportPair,
};

/// Lifecycle notifications published by an endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The connection dropped; pending requests were rejected.
    Disconnected { reason: String },
    /// A new transport was attached after a drop.
    Reconnected { attempt: usize },
    /// Every reconnect attempt failed.
    ReconnectFailed,
}

const EVENT_CAPACITY: usize = 16;

/// Produces a fresh transport pair when the endpoint (re)connects.
#[async_trait]
pub(crate) trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<TransportPair, EndpointError>;
}

/// Payload halves, adapter and supervisor of one logical connection.
pub(crate) struct Connection {
    sender: PayloadSender,
    receiver: PayloadReceiver,
    adapter: ProtocolAdapter,
    policy: ReconnectPolicy,
    attached: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
    shutdown: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub(crate) fn new(handler: Arc<dyn RequestHandler>, config: &StreamingConfig) -> Arc<Self> {
        let config = config.clone().normalized();
        let sender = PayloadSender::new(config.chunk_length());
        let receiver = PayloadReceiver::new(config.chunk_length());
        let adapter = ProtocolAdapter::new(handler, RequestManager::new(), sender.clone(), &receiver, &config);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            sender,
            receiver,
            adapter,
            policy: config.reconnect().clone(),
            attached: AtomicBool::new(false),
            events,
            shutdown: CancellationToken::new(),
            supervisor: Mutex::new(None),
        })
    }

    pub(crate) fn is_connected(&self) -> bool { self.sender.is_connected() && self.receiver.is_connected() }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> { self.events.subscribe() }

    pub(crate) fn adapter(&self) -> &ProtocolAdapter { &self.adapter }

    pub(crate) async fn send(&self, request: StreamingRequest) -> Result<ReceiveResponse, EndpointError> {
        Ok(self.adapter.send_request(request).await?)
    }

    /// Attach a transport pair to the payload halves.
    pub(crate) async fn attach(&self, (sender, receiver): TransportPair) -> Result<(), EndpointError> {
        self.sender.connect(sender).await?;
        if let Err(error) = self.receiver.connect(receiver) {
            self.sender.disconnect("receiver attach failed").await;
            return Err(error.into());
        }
        self.attached.store(true, Ordering::SeqCst);
        metrics::inc_connections();
        Ok(())
    }

    /// Watch the attached transport, tearing it down on disconnect and
    /// reconnecting through `connector` when the policy allows.
    pub(crate) fn supervise(self: &Arc<Self>, connector: Option<Arc<dyn Connector>>) {
        let mut slot = self
            .supervisor
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        *slot = Some(tokio::spawn(Arc::clone(self).supervise_loop(connector)));
    }

    async fn supervise_loop(self: Arc<Self>, connector: Option<Arc<dyn Connector>>) {
        loop {
            let reason = self.wait_for_disconnect().await;
            self.tear_down(&reason).await;
            if self.shutdown.is_cancelled() {
                break;
            }
            let Some(connector) = connector.as_ref().filter(|_| self.policy.is_enabled()) else {
                break;
            };
            if !self.reconnect(connector.as_ref()).await {
                break;
            }
        }
    }

    async fn wait_for_disconnect(&self) -> String {
        let mut sender_events = self.sender.subscribe_disconnected();
        let mut receiver_events = self.receiver.subscribe_disconnected();
        if !self.is_connected() {
            return "transport lost".to_owned();
        }
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => "disconnect requested".to_owned(),
            event = sender_events.recv() => describe(event),
            event = receiver_events.recv() => describe(event),
        }
    }

    /// Detach the transport, fail pending requests and abort streams. Runs
    /// once per attached transport.
    pub(crate) async fn tear_down(&self, reason: &str) {
        if !self.attached.swap(false, Ordering::SeqCst) {
            return;
        }
        self.sender.disconnect(reason).await;
        self.receiver.disconnect(reason);
        let rejected = self
            .adapter
            .request_manager()
            .reject_all(&RequestError::Disconnected(reason.to_owned()));
        self.adapter.abort_streams();
        metrics::dec_connections();
        info!("connection closed: reason={reason}, rejected_requests={rejected}");
        let _ = self.events.send(ConnectionEvent::Disconnected {
            reason: reason.to_owned(),
        });
    }

    async fn reconnect(&self, connector: &dyn Connector) -> bool {
        for (index, delay) in self.policy.delays().enumerate() {
            let attempt = index + 1;
            let connected = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return false,
                result = async {
                    tokio::time::sleep(delay).await;
                    connector.connect().await
                } => result,
            };
            match connected {
                Ok(pair) => match self.attach(pair).await {
                    Ok(()) => {
                        info!("reconnected: attempt={attempt}");
                        let _ = self.events.send(ConnectionEvent::Reconnected { attempt });
                        return true;
                    }
                    Err(error) => warn!("reconnect attach failed: attempt={attempt}, error={error}"),
                },
                Err(error) => debug!("reconnect attempt failed: attempt={attempt}, error={error}"),
            }
        }
        warn!("giving up on reconnect");
        let _ = self.events.send(ConnectionEvent::ReconnectFailed);
        false
    }

    /// Stop supervision and tear the connection down.
    pub(crate) async fn disconnect(&self) {
        self.shutdown.cancel();
        self.tear_down("disconnect requested").await;
    }

    /// Signal the supervisor to stop without waiting for it.
    pub(crate) fn close(&self) { self.shutdown.cancel(); }
}

fn describe(event: Result<DisconnectedEvent, broadcast::error::RecvError>) -> String {
    match event {
        Ok(event) => format!("{} disconnected: {}", event.origin, event.reason),
        Err(error) => format!("disconnect notification lost: {error}"),
    }
}
