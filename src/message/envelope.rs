//! JSON envelopes sent as the body of request and response payloads.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Remove a leading UTF-8 byte-order mark, if present.
#[must_use]
pub fn strip_bom(bytes: &[u8]) -> &[u8] { bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes) }

/// Describes one attachment sent after an envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    /// Stream id used by the attachment's stream frames.
    pub id: Uuid,
    /// MIME type of the attachment.
    #[serde(rename = "type", alias = "contentType", skip_serializing_if = "Option::is_none", default)]
    pub content_type: Option<String>,
    /// Total length in bytes, when known up front.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        deserialize_with = "lenient::optional_usize"
    )]
    pub length: Option<usize>,
}

/// Body of a `request` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub verb: String,
    pub path: String,
    #[serde(default)]
    pub streams: Vec<StreamDescription>,
}

/// Body of a `response` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    #[serde(deserialize_with = "lenient::status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub streams: Vec<StreamDescription>,
}

/// Peers written in loosely typed languages sometimes quote numbers.
mod lenient {
    use super::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    impl NumberOrString {
        fn into_u64<E: serde::de::Error>(self) -> Result<u64, E> {
            match self {
                Self::Number(value) => Ok(value),
                Self::Text(text) => text.trim().parse().map_err(E::custom),
            }
        }
    }

    pub(super) fn status_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let value = NumberOrString::deserialize(deserializer)?.into_u64()?;
        u16::try_from(value).map_err(serde::de::Error::custom)
    }

    pub(super) fn optional_usize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        Option::<NumberOrString>::deserialize(deserializer)?
            .map(|raw| {
                let value = raw.into_u64()?;
                usize::try_from(value).map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
