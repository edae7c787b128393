//! MTU bounds and the sizing rules derived from them.

use std::num::NonZeroUsize;

use derive_more::Display;

use crate::packet::{HEADER_LEN, MAX_PAYLOAD_LEN};

/// Bytes of each ATT write reserved for link-layer overhead.
pub const LINK_OVERHEAD: usize = 4;

/// Margin subtracted from the write size when sizing message chunks.
///
/// Covers the 8-byte packet header plus one trailer byte.
pub const CHUNK_MARGIN: usize = HEADER_LEN + 1;

/// Outer message length of the nonce request, which the firmware expects in a
/// single 46-byte chunk regardless of the negotiated MTU.
pub const NONCE_REQUEST_LEN: usize = 46;

/// Packet buffer length that is always written as a single unit regardless
/// of the negotiated MTU.
///
/// This is not the nonce request's buffer: a 46-byte nonce request encodes to
/// 54 packet bytes and is split at the write size like any other buffer.
pub const SINGLE_UNIT_BUFFER_LEN: usize = 55;

/// Default cap on a reassembled inbound response.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// Negotiated ATT MTU.
///
/// # Examples
///
/// ```
/// use sdalink::fragment::Mtu;
///
/// let mtu = Mtu::PREFERRED;
/// assert_eq!(mtu.write_unit_len(), 240);
/// assert_eq!(mtu.payload_budget(), 231);
/// assert_eq!(Mtu::clamped(1000), Mtu::MAX);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{_0}")]
pub struct Mtu(u16);

impl Mtu {
    /// Smallest MTU a BLE link can negotiate.
    pub const MIN: Self = Self(23);
    /// Largest MTU the ATT protocol allows.
    pub const MAX: Self = Self(517);
    /// MTU requested after connecting.
    pub const PREFERRED: Self = Self(244);

    /// Construct an MTU, returning `None` outside [`Self::MIN`]..=[`Self::MAX`].
    #[must_use]
    pub const fn new(value: u16) -> Option<Self> {
        if value < Self::MIN.0 || value > Self::MAX.0 {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Construct an MTU, clamping `value` into the supported range.
    #[must_use]
    pub fn clamped(value: u16) -> Self { Self(value.clamp(Self::MIN.0, Self::MAX.0)) }

    /// Raw MTU value.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }

    /// Largest single transport write for this MTU.
    #[must_use]
    pub fn write_unit_len(self) -> usize { usize::from(self.0) - LINK_OVERHEAD }

    /// Message bytes carried by one packet for this MTU.
    #[must_use]
    pub fn payload_budget(self) -> usize {
        (usize::from(self.0) - LINK_OVERHEAD - CHUNK_MARGIN).min(MAX_PAYLOAD_LEN)
    }
}

impl Default for Mtu {
    fn default() -> Self { Self::MIN }
}

/// Chunk size used to split an outer message of `message_len` bytes.
#[must_use]
pub fn message_chunk_len(message_len: usize, mtu: Mtu) -> NonZeroUsize {
    let len = if message_len == NONCE_REQUEST_LEN {
        NONCE_REQUEST_LEN
    } else {
        mtu.payload_budget()
    };
    NonZeroUsize::new(len).unwrap_or(NonZeroUsize::MIN)
}

/// Unit size used to split a packet buffer of `buffer_len` bytes for writing.
#[must_use]
pub fn transport_unit_len(buffer_len: usize, mtu: Mtu) -> NonZeroUsize {
    let len = if buffer_len == SINGLE_UNIT_BUFFER_LEN {
        SINGLE_UNIT_BUFFER_LEN
    } else {
        mtu.write_unit_len()
    };
    NonZeroUsize::new(len).unwrap_or(NonZeroUsize::MIN)
}

/// How the payload of an inbound notification is delimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadBounds {
    /// Use the header's length field and ignore trailing bytes.
    #[default]
    HeaderLength,
    /// Take everything after the header except the final byte.
    DropTrailingByte,
}

/// Settings bounding inbound reassembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentationConfig {
    /// Hard cap on a reassembled response.
    pub max_response_size: NonZeroUsize,
    /// Payload delimiting rule for inbound packets.
    pub payload_bounds: PayloadBounds,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            max_response_size: NonZeroUsize::new(DEFAULT_MAX_RESPONSE_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            payload_bounds: PayloadBounds::default(),
        }
    }
}
