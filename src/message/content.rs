//! Outbound attachment bodies.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::AsyncRead;

/// Source of an attachment's bytes.
pub enum ContentBody {
    /// Fully buffered bytes.
    Bytes(Bytes),
    /// Reader drained frame by frame until EOF. The length may be unknown.
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        length: Option<usize>,
    },
}

impl fmt::Debug for ContentBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader { length, .. } => f.debug_struct("Reader").field("length", length).finish(),
        }
    }
}

/// One attachment of an outgoing request or response.
#[derive(Debug)]
pub struct HttpContent {
    content_type: String,
    body: ContentBody,
}

impl HttpContent {
    /// Attachment backed by buffered bytes.
    pub fn bytes(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: ContentBody::Bytes(body.into()),
        }
    }

    /// UTF-8 text attachment.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes("text/plain; charset=utf-8", body.into())
    }

    /// JSON attachment.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::bytes("application/json; charset=utf-8", serde_json::to_vec(value)?))
    }

    /// Attachment read from `reader` until EOF.
    pub fn from_reader<R>(content_type: impl Into<String>, reader: R, length: Option<usize>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            content_type: content_type.into(),
            body: ContentBody::Reader {
                reader: Box::new(reader),
                length,
            },
        }
    }

    #[must_use]
    pub fn content_type(&self) -> &str { &self.content_type }

    /// Length announced in the envelope descriptor.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        match &self.body {
            ContentBody::Bytes(bytes) => Some(bytes.len()),
            ContentBody::Reader { length, .. } => *length,
        }
    }

    pub(crate) fn into_body(self) -> ContentBody { self.body }
}
