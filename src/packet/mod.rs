//! SDA link packets.
//!
//! Every transport unit carries one or more packets, each an 8-byte header
//! followed by a bounded payload:
//!
//! ```text
//! [seq, control, len, total_lo, total_hi, re_requested, reserved0, reserved1, payload..]
//! ```
//!
//! The header layout is fixed by the peripheral firmware and must be kept
//! byte for byte.

pub mod codec;
pub mod error;
pub mod header;

pub use codec::{Packet, PacketCodec};
pub use error::PacketError;
pub use header::{
    ControlFrame,
    FragmentNumber,
    HEADER_LEN,
    MAX_PAYLOAD_LEN,
    SequenceNumber,
    has_more_fragments,
};

#[cfg(test)]
mod tests;
