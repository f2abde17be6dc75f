//! Errors raised while sending or receiving frames.

use std::io;

use thiserror::Error;

use crate::header::HeaderError;

/// Errors produced by the payload layer.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// `connect` was called while a transport is attached.
    #[error("transport already connected")]
    AlreadyConnected,
    /// No transport is attached.
    #[error("transport not connected")]
    NotConnected,
    /// The payload does not match the header's declared length.
    #[error("payload length mismatch: header declares {declared}, payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    /// A header could not be encoded or decoded.
    #[error("invalid frame header: {0}")]
    Header(#[from] HeaderError),
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}
