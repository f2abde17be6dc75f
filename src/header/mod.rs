//! Fixed-width frame headers.
//!
//! Every frame on the wire starts with a [`Header`] encoded as exactly
//! [`MAX_HEADER_LENGTH`] ASCII bytes:
//!
//! ```text
//! T.LLLLLL.IIIIIIII-IIII-IIII-IIII-IIIIIIIIIIII.E\n
//! ```
//!
//! `T` is the [`PayloadType`] tag, `L` the zero-padded payload length, `I` the
//! hyphenated correlation id and `E` the end flag (`0` or `1`).

mod codec;
pub mod error;

pub use codec::{deserialize, serialize};
pub use error::HeaderError;
use uuid::Uuid;

/// Encoded size of every frame header.
pub const MAX_HEADER_LENGTH: usize = 48;
/// Largest payload chunk read or written per transport call.
pub const MAX_PAYLOAD_LENGTH: usize = 4096;
/// Smallest payload length a header may declare.
pub const MIN_LENGTH: usize = 0;
/// Largest payload length a header may declare.
pub const MAX_LENGTH: usize = 999_999;

/// Kind of payload carried by a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// JSON request envelope.
    Request,
    /// JSON response envelope.
    Response,
    /// Raw content stream bytes.
    Stream,
    /// Ask the peer to stop producing the stream with this id.
    CancelStream,
    /// Ask the peer to abandon every stream on the connection.
    CancelAll,
}

impl PayloadType {
    /// Wire tag for this payload type.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Request => b'A',
            Self::Response => b'B',
            Self::Stream => b'S',
            Self::CancelStream => b'C',
            Self::CancelAll => b'X',
        }
    }

    /// Parse a wire tag.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::UnknownPayloadType`] for unrecognised tags.
    pub const fn from_byte(tag: u8) -> Result<Self, HeaderError> {
        match tag {
            b'A' => Ok(Self::Request),
            b'B' => Ok(Self::Response),
            b'S' => Ok(Self::Stream),
            b'C' => Ok(Self::CancelStream),
            b'X' => Ok(Self::CancelAll),
            other => Err(HeaderError::UnknownPayloadType(other)),
        }
    }

    /// Whether frames of this type carry a JSON envelope that completes
    /// only on the final frame.
    #[must_use]
    pub const fn is_envelope(self) -> bool { matches!(self, Self::Request | Self::Response) }
}

impl std::fmt::Display for PayloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Stream => "stream",
            Self::CancelStream => "cancelStream",
            Self::CancelAll => "cancelAll",
        };
        f.write_str(name)
    }
}

/// Descriptor preceding each frame payload.
///
/// # Examples
///
/// ```
/// use streamframe::header::{Header, PayloadType};
/// use uuid::Uuid;
///
/// let id = Uuid::new_v4();
/// let header = Header::new(PayloadType::Stream, 12, id, true).expect("length in range");
/// assert_eq!(header.payload_length(), 12);
/// assert!(header.end());
/// assert!(Header::new(PayloadType::Stream, 1_000_000, id, true).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Header {
    payload_type: PayloadType,
    payload_length: usize,
    id: Uuid,
    end: bool,
}

impl Header {
    /// Build a header, validating the payload length.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::LengthOutOfRange`] when `payload_length` exceeds
    /// [`MAX_LENGTH`].
    pub fn new(
        payload_type: PayloadType,
        payload_length: usize,
        id: Uuid,
        end: bool,
    ) -> Result<Self, HeaderError> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&payload_length) {
            return Err(HeaderError::LengthOutOfRange {
                length: payload_length,
                max: MAX_LENGTH,
            });
        }
        Ok(Self {
            payload_type,
            payload_length,
            id,
            end,
        })
    }

    /// Payload type tag.
    #[must_use]
    pub const fn payload_type(&self) -> PayloadType { self.payload_type }

    /// Number of payload bytes following this header.
    #[must_use]
    pub const fn payload_length(&self) -> usize { self.payload_length }

    /// Correlation id.
    #[must_use]
    pub const fn id(&self) -> Uuid { self.id }

    /// Whether this is the final frame for [`id`](Self::id).
    #[must_use]
    pub const fn end(&self) -> bool { self.end }
}
