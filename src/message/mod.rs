//! Request and response messages.
//!
//! Outbound messages ([`StreamingRequest`], [`StreamingResponse`]) carry
//! [`HttpContent`] attachments that are sent as separate streams after the
//! JSON envelope. Inbound messages ([`ReceiveRequest`], [`ReceiveResponse`])
//! expose those attachments as [`ContentStream`](crate::stream::ContentStream)s.

mod content;
mod envelope;
mod outgoing;
mod receive;

pub use content::{ContentBody, HttpContent};
pub use envelope::{RequestPayload, ResponsePayload, StreamDescription, strip_bom};
pub use outgoing::{StreamingRequest, StreamingResponse};
pub use receive::{ReceiveRequest, ReceiveResponse};
