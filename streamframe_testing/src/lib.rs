//! Utilities for exercising `streamframe` connections in tests.
//!
//! The helpers build connected payload halves and protocol adapters over
//! `tokio::io::duplex` streams, plus transports that misbehave on purpose
//! (short reads, failed writes) and request handlers that record what they
//! were given.
//!
//! ```rust
//! use streamframe::StreamingRequest;
//! use streamframe_testing::{adapter_pair, status_handler};
//!
//! # async fn example() {
//! let (client, _server) = adapter_pair(status_handler(404), status_handler(200)).await;
//! let response = client.adapter.send_request(StreamingRequest::create("GET", "/")).await.unwrap();
//! assert_eq!(response.status_code, 200);
//! # }
//! ```

pub mod handlers;
pub mod logging;
pub mod peers;
pub mod transport;

pub use handlers::{RecordingRequestHandler, echo_handler, status_handler};
pub use logging::{LoggerHandle, logger};
pub use peers::{Peer, adapter_pair, adapter_pair_with_config, connect_peer};
pub use transport::{ChunkedReceiver, FailingSender, duplex_pair};
