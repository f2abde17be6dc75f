//! Request/response semantics on top of the payload layer.
//!
//! The [`ProtocolAdapter`] dispatches assembled inbound requests to a
//! [`RequestHandler`], matches inbound responses to pending outbound requests
//! through the [`RequestManager`], and sends outbound messages as an envelope
//! followed by their attachment streams.

mod adapter;
pub mod error;
mod handler;
mod request_manager;

pub use adapter::ProtocolAdapter;
pub use error::{ProtocolError, RequestError, RequestManagerError};
pub use handler::{RequestHandler, handler_fn};
pub use request_manager::{PendingResponse, RequestManager};
