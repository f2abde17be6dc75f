//! WebSocket transport halves.
//!
//! Each [`send`](TransportSender::send) becomes one binary message. On the
//! read side message boundaries are ignored: payload bytes are buffered and
//! handed out in whatever sizes the caller asks for, so the payload receiver
//! sees a plain byte stream.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    SinkExt,
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{self, Message},
};

use super::{TransportReceiver, TransportSender, closed_error};

/// Split an established WebSocket into transport halves.
pub fn split_websocket<S>(ws: WebSocketStream<S>) -> (WebSocketSender<S>, WebSocketReceiver<S>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (sink, stream) = ws.split();
    (
        WebSocketSender { sink: Some(sink) },
        WebSocketReceiver {
            stream: Some(stream),
            pending: Bytes::new(),
        },
    )
}

/// [`TransportSender`] writing binary WebSocket messages.
pub struct WebSocketSender<S> {
    sink: Option<SplitSink<WebSocketStream<S>, Message>>,
}

#[async_trait]
impl<S> TransportSender for WebSocketSender<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn is_connected(&self) -> bool { self.sink.is_some() }

    async fn send(&mut self, buffer: &[u8]) -> io::Result<usize> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| closed_error("websocket sender"))?;
        sink.send(Message::Binary(Bytes::copy_from_slice(buffer)))
            .await
            .map_err(into_io_error)?;
        Ok(buffer.len())
    }

    async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.send(Message::Close(None)).await;
            if let Err(e) = sink.close().await {
                log::debug!("websocket sender close failed: error={e}");
            }
        }
    }
}

/// [`TransportReceiver`] flattening WebSocket messages into a byte stream.
pub struct WebSocketReceiver<S> {
    stream: Option<SplitStream<WebSocketStream<S>>>,
    pending: Bytes,
}

impl<S> WebSocketReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_payload(&mut self) -> io::Result<Bytes> {
        loop {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| closed_error("websocket receiver"))?;
            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(into_io_error(e));
                }
                None => {
                    self.stream = None;
                    return Err(peer_closed());
                }
            };
            match message {
                Message::Binary(data) if !data.is_empty() => return Ok(data),
                Message::Text(text) if !text.is_empty() => {
                    return Ok(Bytes::copy_from_slice(text.as_str().as_bytes()));
                }
                Message::Close(_) => {
                    self.stream = None;
                    return Err(peer_closed());
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl<S> TransportReceiver for WebSocketReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn is_connected(&self) -> bool { self.stream.is_some() || !self.pending.is_empty() }

    async fn receive(&mut self, count: usize) -> io::Result<Bytes> {
        if count == 0 {
            return Ok(Bytes::new());
        }
        if self.pending.is_empty() {
            self.pending = self.next_payload().await?;
        }
        let take = count.min(self.pending.len());
        Ok(self.pending.split_to(take))
    }

    async fn close(&mut self) {
        self.stream = None;
        self.pending = Bytes::new();
    }
}

fn peer_closed() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "websocket closed by peer")
}

fn into_io_error(error: tungstenite::Error) -> io::Error {
    match error {
        tungstenite::Error::Io(e) => e,
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => peer_closed(),
        other => io::Error::other(other),
    }
}
