//! Named-pipe server and client endpoints.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{
    EndpointError,
    connection::{Connection, ConnectionEvent, Connector},
};
use crate::{
    config::StreamingConfig,
    message::{ReceiveResponse, StreamingRequest},
    protocol::{ProtocolAdapter, RequestHandler},
    transport::{
        TransportPair,
        named_pipe::{self, PipeListener, PipePaths},
    },
};

fn pipe_paths(base_name: &str, config: &StreamingConfig) -> Result<PipePaths, EndpointError> {
    if base_name.is_empty() {
        return Err(EndpointError::MissingBaseName);
    }
    Ok(PipePaths::new(config.pipe_root(), base_name))
}

struct AcceptNext(Arc<PipeListener>);

#[async_trait]
impl Connector for AcceptNext {
    async fn connect(&self) -> Result<TransportPair, EndpointError> { Ok(self.0.accept().await?) }
}

/// Serves one client at a time over a named-pipe pair.
///
/// The pipes are bound when the server is created, so a second server using
/// the same base name fails with an "address in use" error. With reconnect
/// enabled the server accepts the next client after a disconnect.
pub struct NamedPipeServer {
    listener: Arc<PipeListener>,
    connection: Arc<Connection>,
}

impl NamedPipeServer {
    /// Bind the pipe pair for `base_name`.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::MissingBaseName`] for an empty name, or the
    /// I/O error raised while binding.
    pub async fn bind(
        base_name: &str,
        handler: Arc<dyn RequestHandler>,
        config: &StreamingConfig,
    ) -> Result<Self, EndpointError> {
        let paths = pipe_paths(base_name, config)?;
        let listener = Arc::new(PipeListener::bind(&paths).await?);
        Ok(Self {
            listener,
            connection: Connection::new(handler, config),
        })
    }

    /// Wait for a client to connect and start serving it.
    ///
    /// # Errors
    ///
    /// Returns the error raised while accepting or attaching the client.
    pub async fn start(&self) -> Result<(), EndpointError> {
        let pair = self.listener.accept().await?;
        self.connection.attach(pair).await?;
        self.connection
            .supervise(Some(Arc::new(AcceptNext(Arc::clone(&self.listener)))));
        Ok(())
    }

    #[must_use]
    pub fn paths(&self) -> &PipePaths { self.listener.paths() }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.connection.is_connected() }

    #[must_use]
    pub fn adapter(&self) -> &ProtocolAdapter { self.connection.adapter() }

    /// Send a request to the connected client.
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

    /// Close the connection and stop accepting reconnects.
    pub async fn disconnect(&self) { self.connection.disconnect().await; }
}

impl Drop for NamedPipeServer {
    fn drop(&mut self) { self.connection.close(); }
}

struct ConnectPaths(PipePaths);

#[async_trait]
impl Connector for ConnectPaths {
    async fn connect(&self) -> Result<TransportPair, EndpointError> { Ok(named_pipe::connect(&self.0).await?) }
}

/// Connects to a [`NamedPipeServer`] by base name.
pub struct NamedPipeClient {
    paths: PipePaths,
    connection: Arc<Connection>,
}

impl NamedPipeClient {
    /// Create a client for `base_name`. Nothing is opened until
    /// [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::MissingBaseName`] for an empty name.
    pub fn new(
        base_name: &str,
        handler: Arc<dyn RequestHandler>,
        config: &StreamingConfig,
    ) -> Result<Self, EndpointError> {
        Ok(Self {
            paths: pipe_paths(base_name, config)?,
            connection: Connection::new(handler, config),
        })
    }

    /// Open both pipes.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when the server is not listening, or
    /// [`EndpointError::Payload`] when already connected.
    pub async fn connect(&self) -> Result<(), EndpointError> {
        let pair = named_pipe::connect(&self.paths).await?;
        self.connection.attach(pair).await?;
        self.connection
            .supervise(Some(Arc::new(ConnectPaths(self.paths.clone()))));
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

    /// Close the connection and stop reconnecting.
    pub async fn disconnect(&self) { self.connection.disconnect().await; }
}

impl Drop for NamedPipeClient {
    fn drop(&mut self) { self.connection.close(); }
}
