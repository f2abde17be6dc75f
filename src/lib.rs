#![doc(html_root_url = "https://docs.rs/streamframe/latest")]
//! Streaming request/response protocol over duplex byte channels.
//!
//! Messages are split into frames, each led by a fixed 48-byte ASCII
//! [`header`]. A JSON envelope describes a request or response, and its
//! bodies travel as separately framed attachment streams that the receiver
//! can consume while they are still arriving. The crate layers are:
//!
//! - [`transport`]: raw byte channels (Unix sockets, Windows named pipes,
//!   WebSocket).
//! - [`payload`]: frame sender, receive loop and disassembler.
//! - [`stream`] and [`assembler`]: reassembly of inbound payloads.
//! - [`protocol`]: request dispatch and response correlation.
//! - [`endpoint`]: named-pipe and WebSocket servers and clients.

pub mod assembler;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod header;
pub mod message;
pub mod metrics;
pub mod payload;
pub mod protocol;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use config::StreamingConfig;
pub use error::{Result, StreamingError};
pub use header::{Header, PayloadType};
pub use message::{ReceiveRequest, ReceiveResponse, StreamingRequest, StreamingResponse};
pub use metrics::{CONNECTIONS_ACTIVE, Direction, ERRORS_TOTAL, FRAMES_PROCESSED, STREAMS_CANCELLED};
pub use protocol::{ProtocolAdapter, RequestHandler};
