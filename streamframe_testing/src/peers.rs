//! Protocol adapters joined by an in-memory pipe.

use std::sync::Arc;

use streamframe::{
    StreamingConfig,
    payload::{PayloadReceiver, PayloadSender},
    protocol::{ProtocolAdapter, RequestHandler, RequestManager},
    transport::TransportPair,
};

use crate::transport::duplex_pair;

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// One side of a connection: its adapter and payload halves.
pub struct Peer {
    pub adapter: ProtocolAdapter,
    pub sender: PayloadSender,
    pub receiver: PayloadReceiver,
}

/// Wire `handler` to `transport` and connect both payload halves.
///
/// # Panics
///
/// Panics if either half refuses the transport.
pub async fn connect_peer(
    handler: Arc<dyn RequestHandler>,
    config: &StreamingConfig,
    (sender_io, receiver_io): TransportPair,
) -> Peer {
    let sender = PayloadSender::new(config.chunk_length());
    let receiver = PayloadReceiver::new(config.chunk_length());
    let adapter = ProtocolAdapter::new(handler, RequestManager::new(), sender.clone(), &receiver, config);
    sender.connect(sender_io).await.expect("connect sender");
    receiver.connect(receiver_io).expect("connect receiver");
    Peer {
        adapter,
        sender,
        receiver,
    }
}

/// Client and server peers using the default configuration.
pub async fn adapter_pair(
    client: Arc<dyn RequestHandler>,
    server: Arc<dyn RequestHandler>,
) -> (Peer, Peer) {
    adapter_pair_with_config(client, server, &StreamingConfig::default()).await
}

/// Client and server peers sharing `config`.
pub async fn adapter_pair_with_config(
    client: Arc<dyn RequestHandler>,
    server: Arc<dyn RequestHandler>,
    config: &StreamingConfig,
) -> (Peer, Peer) {
    let (client_io, server_io) = duplex_pair(DUPLEX_CAPACITY);
    (
        connect_peer(client, config, client_io).await,
        connect_peer(server, config, server_io).await,
    )
}
