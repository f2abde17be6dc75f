//! Reassembly of inbound payloads.
//!
//! [`PayloadAssembler`] accumulates the frames of one payload id.
//! [`AssemblerManager`] routes frames from the payload receiver to the right
//! assembler and turns completed envelopes into [`InboundEvent`]s.

mod manager;
mod payload;

pub use manager::{AssemblerManager, InboundEvent};
pub use payload::{AssemblerInit, PayloadAssembler};

#[cfg(test)]
mod tests;
