//! Framing errors raised while building or decoding headers.

use thiserror::Error;

/// Errors produced by the header codec.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The declared payload length falls outside the permitted range.
    #[error("payload length {length} exceeds maximum {max}")]
    LengthOutOfRange { length: usize, max: usize },
    /// The supplied buffer is not exactly one header long.
    #[error("header buffer must be {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
    /// The payload type tag is not recognised.
    #[error("unknown payload type tag {0:#04x}")]
    UnknownPayloadType(u8),
    /// A delimiter or terminator byte is missing.
    #[error("expected {expected:?} at offset {offset}, found {found:#04x}")]
    Delimiter {
        offset: usize,
        expected: char,
        found: u8,
    },
    /// The length field is not a decimal number.
    #[error("payload length field is not numeric")]
    InvalidLength,
    /// The id field is not a hyphenated UUID.
    #[error("invalid correlation id: {0}")]
    InvalidId(String),
    /// The end flag is neither `0` nor `1`.
    #[error("invalid end flag {0:#04x}")]
    InvalidEnd(u8),
}
