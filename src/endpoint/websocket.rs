//! WebSocket server and client endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast,
};
use tokio_tungstenite::WebSocketStream;

use super::{
    EndpointError,
    connection::{Connection, ConnectionEvent, Connector},
};
use crate::{
    config::StreamingConfig,
    message::{ReceiveResponse, StreamingRequest},
    protocol::{ProtocolAdapter, RequestHandler},
    transport::{TransportPair, split_websocket},
};

fn websocket_pair<S>(stream: WebSocketStream<S>) -> TransportPair
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, receiver) = split_websocket(stream);
    (Box::new(sender), Box::new(receiver))
}

/// Serves the peer of an already upgraded WebSocket.
///
/// The HTTP upgrade belongs to the host; once the socket closes, the host
/// accepts a new one and creates a new server.
pub struct WebSocketServer {
    connection: Arc<Connection>,
}

impl WebSocketServer {
    /// Start serving `stream`.
    ///
    /// # Errors
    ///
    /// Returns the error raised while attaching the socket.
    pub async fn accept<S>(
        stream: WebSocketStream<S>,
        handler: Arc<dyn RequestHandler>,
        config: &StreamingConfig,
    ) -> Result<Self, EndpointError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let connection = Connection::new(handler, config);
        connection.attach(websocket_pair(stream)).await?;
        connection.supervise(None);
        Ok(Self { connection })
    }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.connection.is_connected() }

    #[must_use]
    pub fn adapter(&self) -> &ProtocolAdapter { self.connection.adapter() }

    /// Send a request to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Protocol`] when sending fails or the
    /// connection drops before the response.
    pub async fn send(&self, request: StreamingRequest) -> Result<ReceiveResponse, EndpointError> {
        self.connection.send(request).await
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> { self.connection.subscribe() }

    pub async fn disconnect(&self) { self.connection.disconnect().await; }
}

impl Drop for WebSocketServer {
    fn drop(&mut self) { self.connection.close(); }
}

struct DialUrl(String);

#[async_trait]
impl Connector for DialUrl {
    async fn connect(&self) -> Result<TransportPair, EndpointError> {
        let (stream, _) = tokio_tungstenite::connect_async(self.0.as_str()).await?;
        Ok(websocket_pair(stream))
    }
}

/// Dials a WebSocket URL and speaks the protocol over it.
pub struct WebSocketClient {
    url: String,
    connection: Arc<Connection>,
}

impl WebSocketClient {
    /// Create a client for `url` (`ws://` or `wss://`). Nothing is opened
    /// until [`connect`](Self::connect).
    pub fn new(url: impl Into<String>, handler: Arc<dyn RequestHandler>, config: &StreamingConfig) -> Self {
        Self {
            url: url.into(),
            connection: Connection::new(handler, config),
        }
    }

    /// Perform the handshake and start the connection.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::WebSocket`] when the handshake fails.
    pub async fn connect(&self) -> Result<(), EndpointError> {
        let dialer = Arc::new(DialUrl(self.url.clone()));
        let pair = dialer.connect().await?;
        self.connection.attach(pair).await?;
        self.connection.supervise(Some(dialer));
        Ok(())
    }

    /// Attach an already established socket, for hosts that dial themselves.
    ///
    /// # Errors
    ///
    /// Returns the error raised while attaching the socket.
    pub async fn connect_stream<S>(&self, stream: WebSocketStream<S>) -> Result<(), EndpointError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.connection.attach(websocket_pair(stream)).await?;
        self.connection
            .supervise(Some(Arc::new(DialUrl(self.url.clone()))));
        Ok(())
    }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.connection.is_connected() }

    #[must_use]
    pub fn adapter(&self) -> &ProtocolAdapter { self.connection.adapter() }

    /// Send a request to the server.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::Protocol`] when sending fails or the
    /// connection drops before the response.
    pub async fn send(&self, request: StreamingRequest) -> Result<ReceiveResponse, EndpointError> {
        self.connection.send(request).await
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> { self.connection.subscribe() }

    pub async fn disconnect(&self) { self.connection.disconnect().await; }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) { self.connection.close(); }
}
