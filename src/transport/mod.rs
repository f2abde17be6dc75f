//! Raw duplex byte channels.
//!
//! The protocol layers only need three primitives from a connection:
//! `send(bytes)`, `receive(count)` and `close()`. [`TransportSender`] and
//! [`TransportReceiver`] capture those primitives so the payload sender and
//! receiver stay agnostic of the underlying socket type.
//!
//! Bindings provided here:
//!
//! - [`stream`]: any tokio `AsyncRead`/`AsyncWrite` half (Unix sockets,
//!   Windows named pipes, in-memory duplex streams).
//! - [`websocket`]: binary WebSocket messages over `tokio-tungstenite`,
//!   presented as a continuous byte stream.
//! - [`named_pipe`]: helpers for the `<base>.incoming` / `<base>.outgoing`
//!   pipe pair.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

pub mod named_pipe;
pub mod stream;
pub mod websocket;

pub use stream::{StreamReceiver, StreamSender};
pub use websocket::{WebSocketReceiver, WebSocketSender, split_websocket};

/// Boxed halves of one duplex connection.
pub type TransportPair = (Box<dyn TransportSender>, Box<dyn TransportReceiver>);

/// Write half of a duplex connection.
#[async_trait]
pub trait TransportSender: Send {
    /// Whether the channel can still accept writes.
    fn is_connected(&self) -> bool;

    /// Write `buffer`, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the channel is closed or the write fails.
    async fn send(&mut self, buffer: &[u8]) -> io::Result<usize>;

    /// Close the channel. Calling `close` more than once is harmless.
    async fn close(&mut self);
}

/// Read half of a duplex connection.
#[async_trait]
pub trait TransportReceiver: Send {
    /// Whether the channel may still yield bytes.
    fn is_connected(&self) -> bool;

    /// Read at most `count` bytes.
    ///
    /// Implementations may return fewer bytes than requested; callers loop
    /// until they have what they need.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] once the peer has closed the
    /// channel, or any other I/O error raised by the socket.
    async fn receive(&mut self, count: usize) -> io::Result<Bytes>;

    /// Close the channel. Calling `close` more than once is harmless.
    async fn close(&mut self);
}

pub(crate) fn closed_error(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, format!("{what} is closed"))
}
