//! Errors raised by connection endpoints.

use std::io;

use thiserror::Error;

use crate::{payload::PayloadError, protocol::ProtocolError};

/// Errors produced while establishing or using an endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Named-pipe endpoints need a non-empty base name.
    #[error("named pipe base name must not be empty")]
    MissingBaseName,
    /// Binding, accepting or connecting the transport failed.
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),
    /// The WebSocket handshake or transport failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    /// Attaching the transport to the payload layer failed.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// Sending a request or awaiting its response failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<tokio_tungstenite::tungstenite::Error> for EndpointError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self { Self::WebSocket(Box::new(error)) }
}
