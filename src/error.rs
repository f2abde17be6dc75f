//! Canonical error and result types for the crate.
//!
//! Each layer reports its own error enum; [`StreamingError`] unifies them for
//! callers that drive several layers at once, such as the demo binary.

use thiserror::Error;

use crate::{
    endpoint::EndpointError,
    header::HeaderError,
    payload::PayloadError,
    protocol::{ProtocolError, RequestManagerError},
};

/// Top-level error type exposed by `streamframe`.
#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("header error: {0}")]
    Header(#[from] HeaderError),
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),
    #[error("request manager error: {0}")]
    RequestManager(#[from] RequestManagerError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamingError {
    /// Whether the error means the connection went away rather than a
    /// malformed message.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        use crate::protocol::RequestError;

        match self {
            Self::Io(_) | Self::Payload(PayloadError::Io(_) | PayloadError::NotConnected) => true,
            Self::Protocol(ProtocolError::Request(RequestError::Disconnected(_)))
            | Self::Endpoint(EndpointError::Protocol(ProtocolError::Request(RequestError::Disconnected(_)))) => true,
            _ => false,
        }
    }
}

/// Result type using [`StreamingError`].
pub type Result<T, E = StreamingError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::protocol::RequestError;

    #[rstest]
    #[case(StreamingError::from(std::io::Error::other("reset")), true)]
    #[case(StreamingError::from(PayloadError::NotConnected), true)]
    #[case(
        StreamingError::from(ProtocolError::from(RequestError::Disconnected("gone".into()))),
        true
    )]
    #[case(StreamingError::from(HeaderError::InvalidLength), false)]
    #[case(StreamingError::from(ProtocolError::Cancelled), false)]
    fn classifies_disconnects(#[case] error: StreamingError, #[case] expected: bool) {
        assert_eq!(error.is_disconnect(), expected);
    }
}
