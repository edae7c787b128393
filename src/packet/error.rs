//! Errors raised while encoding or decoding packets.

use thiserror::Error;

use super::{HEADER_LEN, MAX_PAYLOAD_LEN};

/// Errors produced by [`Packet`](crate::packet::Packet) encoding and decoding.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// The payload does not fit a single packet.
    #[error("packet payload of {len} bytes exceeds the {max}-byte ceiling", max = MAX_PAYLOAD_LEN)]
    PayloadTooLarge { len: usize },
    /// The fragment number does not fit the five control-frame bits.
    #[error("fragment number {0} does not fit the control frame")]
    FragmentNumberOutOfRange(u16),
    /// The outer message is too large for the 16-bit total-size field.
    #[error("total payload size {0} exceeds the 16-bit header field")]
    TotalSizeOutOfRange(u32),
    /// The buffer cannot hold a packet header.
    #[error("buffer of {len} bytes is shorter than the packet header ({header} bytes)", header = HEADER_LEN)]
    TooShort { len: usize },
    /// The header declares more payload than the buffer carries.
    #[error("packet declares {declared} payload bytes but only {available} are present")]
    Truncated { declared: usize, available: usize },
}
