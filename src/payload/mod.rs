//! Frame-level send and receive over a transport.
//!
//! [`PayloadSender`] serializes frames onto a [`TransportSender`], keeping
//! each frame contiguous on the wire. [`PayloadReceiver`] runs the receive
//! loop that parses headers and hands payload bytes to a [`FrameHandler`].
//! [`Disassembler`] splits outbound envelopes and attachments into frames.
//!
//! [`TransportSender`]: crate::transport::TransportSender

mod disassembler;
pub mod error;
mod receiver;
mod sender;

use std::fmt;

pub use disassembler::{Disassembler, OutboundFrame, SendOutcome};
pub use error::PayloadError;
pub use receiver::{FrameHandler, PayloadReceiver};
pub use sender::PayloadSender;

/// Which half of a connection noticed the disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectOrigin {
    Sender,
    Receiver,
}

impl fmt::Display for DisconnectOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        })
    }
}

/// Raised once per connected lifetime when a sender or receiver stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectedEvent {
    pub origin: DisconnectOrigin,
    pub reason: String,
}

/// Capacity of the disconnect broadcast channels.
const EVENT_CAPACITY: usize = 16;

#[cfg(test)]
mod tests;
