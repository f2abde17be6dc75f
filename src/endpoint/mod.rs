//! Connection endpoints.
//!
//! Each endpoint owns a payload sender/receiver pair, a protocol adapter and a
//! supervisor task. When the transport drops, the supervisor rejects every
//! pending request, aborts every stream, publishes
//! [`ConnectionEvent::Disconnected`], and then follows the configured
//! [`ReconnectPolicy`].

mod connection;
pub mod error;
mod named_pipe;
mod reconnect;
mod websocket;

pub use connection::ConnectionEvent;
pub use error::EndpointError;
pub use named_pipe::{NamedPipeClient, NamedPipeServer};
pub use reconnect::{BackoffConfig, ReconnectPolicy};
pub use websocket::{WebSocketClient, WebSocketServer};
