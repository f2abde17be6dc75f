//! Splits outbound envelopes and attachments into frames.

use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicBool, Ordering},
};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use super::{PayloadError, PayloadSender};
use crate::{
    header::{Header, HeaderError, MAX_LENGTH, PayloadType},
    message::ContentBody,
};

/// Whether an attachment was sent to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    /// The peer cancelled the stream before its final frame was sent.
    Cancelled,
}

/// One frame ready for [`PayloadSender::send_payload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundFrame {
    header: Header,
    payload: Bytes,
}

impl OutboundFrame {
    #[must_use]
    pub fn header(&self) -> &Header { &self.header }

    #[must_use]
    pub fn payload(&self) -> &[u8] { &self.payload }
}

/// Splits payloads into frames of at most `max_frame_length` bytes, marking
/// the last frame with `end`.
#[derive(Clone, Copy, Debug)]
pub struct Disassembler {
    max_frame_length: NonZeroUsize,
}

impl Disassembler {
    /// Create a disassembler. Lengths above [`MAX_LENGTH`] are clamped.
    #[must_use]
    pub fn new(max_frame_length: NonZeroUsize) -> Self {
        let clamped = max_frame_length.get().min(MAX_LENGTH);
        Self {
            max_frame_length: NonZeroUsize::new(clamped).unwrap_or(max_frame_length),
        }
    }

    #[must_use]
    pub const fn max_frame_length(&self) -> NonZeroUsize { self.max_frame_length }

    /// Split `payload` into frames. An empty payload yields one empty final
    /// frame.
    ///
    /// # Errors
    ///
    /// Propagates [`HeaderError`] from header construction.
    pub fn frames(
        &self,
        payload_type: PayloadType,
        id: Uuid,
        payload: &Bytes,
    ) -> Result<Vec<OutboundFrame>, HeaderError> {
        let max = self.max_frame_length.get();
        if payload.is_empty() {
            return Ok(vec![OutboundFrame {
                header: Header::new(payload_type, 0, id, true)?,
                payload: Bytes::new(),
            }]);
        }

        let total = payload.len();
        let mut frames = Vec::with_capacity(total.div_ceil(max));
        let mut offset = 0usize;
        while offset < total {
            let end = (offset + max).min(total);
            frames.push(OutboundFrame {
                header: Header::new(payload_type, end - offset, id, end == total)?,
                payload: payload.slice(offset..end),
            });
            offset = end;
        }
        Ok(frames)
    }

    /// Send a request or response envelope.
    ///
    /// # Errors
    ///
    /// Returns the first [`PayloadError`] raised while sending.
    pub async fn send_envelope(
        &self,
        sender: &PayloadSender,
        payload_type: PayloadType,
        id: Uuid,
        body: Bytes,
    ) -> Result<(), PayloadError> {
        for frame in self.frames(payload_type, id, &body)? {
            sender.send_payload(&frame.header, &frame.payload).await?;
        }
        Ok(())
    }

    /// Send an attachment as stream frames, stopping early once `cancelled`
    /// is set.
    ///
    /// Reader-backed content of unknown length is read one frame ahead so the
    /// final frame can carry `end`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PayloadError`] raised while reading or sending.
    pub async fn send_stream(
        &self,
        sender: &PayloadSender,
        id: Uuid,
        body: ContentBody,
        cancelled: &AtomicBool,
    ) -> Result<SendOutcome, PayloadError> {
        match body {
            ContentBody::Bytes(bytes) => {
                for frame in self.frames(PayloadType::Stream, id, &bytes)? {
                    if cancelled.load(Ordering::SeqCst) {
                        return Ok(SendOutcome::Cancelled);
                    }
                    sender.send_payload(&frame.header, &frame.payload).await?;
                }
                Ok(SendOutcome::Completed)
            }
            ContentBody::Reader { mut reader, .. } => {
                self.send_reader(sender, id, reader.as_mut(), cancelled).await
            }
        }
    }

    async fn send_reader(
        &self,
        sender: &PayloadSender,
        id: Uuid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        cancelled: &AtomicBool,
    ) -> Result<SendOutcome, PayloadError> {
        let max = self.max_frame_length.get();
        let mut current = read_frame_body(reader, max).await?;
        loop {
            let next = if current.len() < max {
                Bytes::new()
            } else {
                read_frame_body(reader, max).await?
            };
            if cancelled.load(Ordering::SeqCst) {
                return Ok(SendOutcome::Cancelled);
            }
            let end = next.is_empty();
            let header = Header::new(PayloadType::Stream, current.len(), id, end)?;
            sender.send_payload(&header, &current).await?;
            if end {
                return Ok(SendOutcome::Completed);
            }
            current = next;
        }
    }

    /// Tell the peer to stop sending the stream with `id`.
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] raised while sending.
    pub async fn send_cancel_stream(&self, sender: &PayloadSender, id: Uuid) -> Result<(), PayloadError> {
        let header = Header::new(PayloadType::CancelStream, 0, id, true)?;
        sender.send_payload(&header, &[]).await
    }

    /// Tell the peer to abandon every stream of the connection.
    ///
    /// # Errors
    ///
    /// Returns the [`PayloadError`] raised while sending.
    pub async fn send_cancel_all(&self, sender: &PayloadSender) -> Result<(), PayloadError> {
        let header = Header::new(PayloadType::CancelAll, 0, Uuid::nil(), true)?;
        sender.send_payload(&header, &[]).await
    }
}

/// Fill up to `max` bytes, stopping early only at EOF.
async fn read_frame_body(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    max: usize,
) -> Result<Bytes, PayloadError> {
    let mut buffer = BytesMut::with_capacity(max);
    while buffer.len() < max {
        let read = (&mut *reader).take((max - buffer.len()) as u64).read_buf(&mut buffer).await?;
        if read == 0 {
            break;
        }
    }
    Ok(buffer.freeze())
}
