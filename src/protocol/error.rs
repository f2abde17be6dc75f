//! Errors raised by the request/response layer.

use thiserror::Error;
use uuid::Uuid;

use crate::payload::PayloadError;

/// Errors produced by [`RequestManager`](super::RequestManager).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RequestManagerError {
    /// A response is already pending for this correlation id.
    #[error("a response is already pending for request {0}")]
    DuplicateRequest(Uuid),
}

/// Why a pending request completed without a response.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    /// The connection dropped before the response arrived.
    #[error("connection lost: {0}")]
    Disconnected(String),
    /// The pending entry was discarded without a response.
    #[error("request abandoned")]
    Abandoned,
}

/// Errors returned by [`ProtocolAdapter`](super::ProtocolAdapter).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    RequestManager(#[from] RequestManagerError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to send message: {0}")]
    Payload(#[from] PayloadError),
    /// The caller's cancellation token fired first.
    #[error("request cancelled")]
    Cancelled,
}
