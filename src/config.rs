//! Connection configuration.
//!
//! [`StreamingConfig`] collects the knobs shared by every endpoint: how many
//! bytes the payload layer moves per transport call, how large outbound frames
//! may grow, where named pipes live, and whether dropped connections are
//! re-established.

use std::{num::NonZeroUsize, path::PathBuf};

use crate::{
    endpoint::ReconnectPolicy,
    header::{MAX_LENGTH, MAX_PAYLOAD_LENGTH},
    transport::named_pipe::default_pipe_root,
};

/// Settings applied to a connection's payload, protocol and endpoint layers.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use streamframe::{config::StreamingConfig, endpoint::ReconnectPolicy};
///
/// let config = StreamingConfig::default()
///     .with_max_frame_length(NonZeroUsize::new(64 * 1024).expect("non-zero"))
///     .with_reconnect(ReconnectPolicy::enabled());
/// assert_eq!(config.max_frame_length().get(), 64 * 1024);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingConfig {
    chunk_length: NonZeroUsize,
    max_frame_length: NonZeroUsize,
    pipe_root: PathBuf,
    reconnect: ReconnectPolicy,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_length: non_zero(MAX_PAYLOAD_LENGTH),
            max_frame_length: non_zero(MAX_LENGTH),
            pipe_root: default_pipe_root(),
            reconnect: ReconnectPolicy::Disabled,
        }
    }
}

fn non_zero(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN) }

impl StreamingConfig {
    /// Bytes moved per transport read or write.
    #[must_use]
    pub fn chunk_length(&self) -> NonZeroUsize { self.chunk_length }

    /// Largest payload placed in a single outbound frame.
    #[must_use]
    pub fn max_frame_length(&self) -> NonZeroUsize { self.max_frame_length }

    /// Directory holding named-pipe sockets.
    #[must_use]
    pub fn pipe_root(&self) -> &std::path::Path { &self.pipe_root }

    #[must_use]
    pub fn reconnect(&self) -> &ReconnectPolicy { &self.reconnect }

    #[must_use]
    pub fn with_chunk_length(mut self, chunk_length: NonZeroUsize) -> Self {
        self.chunk_length = chunk_length;
        self
    }

    #[must_use]
    pub fn with_max_frame_length(mut self, max_frame_length: NonZeroUsize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    #[must_use]
    pub fn with_pipe_root(mut self, pipe_root: impl Into<PathBuf>) -> Self {
        self.pipe_root = pipe_root.into();
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Clamp lengths to what the wire format can express and normalise the
    /// reconnect back-off.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.chunk_length = self.chunk_length.min(non_zero(MAX_PAYLOAD_LENGTH));
        self.max_frame_length = self.max_frame_length.min(non_zero(MAX_LENGTH));
        self.reconnect = self.reconnect.normalized();
        self
    }
}
