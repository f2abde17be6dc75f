//! Inbound content streams and their bookkeeping.
//!
//! A [`ContentStream`] is the receive-side buffer for one out-of-band
//! attachment. The [`StreamManager`] owns the id-keyed table of streams that
//! are still being received and decides, when a stream is closed, whether the
//! peer must be told to stop producing it.

mod content;
mod manager;

pub use content::{ContentStream, StreamEvent, StreamStatus};
pub use manager::{CancelHook, StreamManager};

#[cfg(test)]
mod tests;
