//! Per-id frame accumulator.

use uuid::Uuid;

use crate::{
    header::{Header, PayloadType},
    stream::ContentStream,
};

/// How a [`PayloadAssembler`] learns about its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerInit {
    /// First frame arrived before any descriptor.
    ByHeader(Header),
    /// An envelope descriptor referenced the id before any frame arrived.
    ById(Uuid),
}

impl AssemblerInit {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Self::ByHeader(header) => header.id(),
            Self::ById(id) => *id,
        }
    }
}

/// Accumulates the frames of one payload into a [`ContentStream`].
#[derive(Debug)]
pub struct PayloadAssembler {
    id: Uuid,
    payload_type: PayloadType,
    content_length: Option<usize>,
    end: bool,
    stream: ContentStream,
}

impl PayloadAssembler {
    /// Create an assembler backed by `stream`.
    ///
    /// A single-frame payload announces its total length in its only header;
    /// otherwise the length stays unknown until a descriptor declares it.
    #[must_use]
    pub fn new(init: AssemblerInit, stream: ContentStream) -> Self {
        let (payload_type, content_length) = match init {
            AssemblerInit::ByHeader(header) => (
                header.payload_type(),
                header.end().then_some(header.payload_length()),
            ),
            AssemblerInit::ById(_) => (PayloadType::Stream, None),
        };
        Self {
            id: init.id(),
            payload_type,
            content_length,
            end: false,
            stream,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid { self.id }

    #[must_use]
    pub fn payload_type(&self) -> PayloadType { self.payload_type }

    #[must_use]
    pub fn stream(&self) -> &ContentStream { &self.stream }

    #[must_use]
    pub fn content_length(&self) -> Option<usize> { self.content_length }

    /// Whether the final frame has been fully received.
    #[must_use]
    pub fn is_ended(&self) -> bool { self.end }

    pub(crate) fn declare_length(&mut self, length: Option<usize>) {
        if length.is_some() {
            self.content_length = length;
        }
    }

    /// Record that `received` bytes of the frame described by `header` have
    /// been appended. Returns `true` once the payload's final frame is
    /// complete; for streams this also ends the [`ContentStream`].
    pub fn on_receive(&mut self, header: &Header, received: usize) -> bool {
        if self.end || !header.end() || received < header.payload_length() {
            return self.end;
        }
        self.end = true;
        if self.payload_type == PayloadType::Stream {
            self.stream.finish();
        }
        true
    }

    /// Whether closing now would abandon data the producer still owes.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        !self.end
            || self
                .content_length
                .is_some_and(|declared| self.stream.len() < declared)
    }
}
