//! Header field types for SDA link packets.
//!
//! The 8-byte header carries a message-wide [`SequenceNumber`] and a
//! bit-packed [`ControlFrame`] that combines the per-message
//! [`FragmentNumber`] with the more-fragments flag.

use derive_more::{Display, From, Into};

/// Size of the fixed packet header in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest payload a single packet may carry.
///
/// The 8-byte header plus this payload fits the 239-byte practical ceiling of
/// the smallest MTU the firmware negotiates for SDA traffic.
pub const MAX_PAYLOAD_LEN: usize = 231;

const FRAGMENT_SHIFT: u8 = 3;
const MORE_FRAGMENTS_BIT: u8 = 0b0000_0100;
const RESERVED_BIT: u8 = 0b0000_0010;
const FORMAT_MARKER_BIT: u8 = 0b0000_0001;

/// Sequence number shared by every packet of one outer message.
///
/// Advances once per message and wraps at 256.
///
/// # Examples
///
/// ```
/// use sdalink::packet::SequenceNumber;
///
/// assert_eq!(SequenceNumber::new(255).next(), SequenceNumber::new(0));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{_0}")]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    /// Wrap a raw sequence byte.
    #[must_use]
    pub const fn new(value: u8) -> Self { Self(value) }

    /// Return the raw sequence byte.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Return the following sequence number, wrapping after 255.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

/// Position of a fragment within its outer message.
///
/// Outbound numbering starts at [`FragmentNumber::FIRST`]. The control frame
/// reserves five bits for the value, so numbers above [`FragmentNumber::MAX`]
/// cannot be represented; the fragmenter wraps longer messages back to zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("{_0}")]
pub struct FragmentNumber(u8);

impl FragmentNumber {
    /// Number carried by the first fragment of an outbound message.
    pub const FIRST: Self = Self(1);
    /// Largest representable fragment number.
    pub const MAX: u8 = 31;

    /// Construct a fragment number, returning `None` above [`Self::MAX`].
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value > Self::MAX {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Return the underlying value.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Advance to the next number, returning `None` past [`Self::MAX`].
    #[must_use]
    pub const fn checked_increment(self) -> Option<Self> { Self::new(self.0 + 1) }
}

/// Bit-packed control byte.
///
/// Layout: bits 7..3 fragment number, bit 2 more-fragments flag, bit 1
/// reserved (zero), bit 0 format marker (always set on encode).
///
/// # Examples
///
/// ```
/// use sdalink::packet::{ControlFrame, FragmentNumber};
///
/// let control = ControlFrame::new(FragmentNumber::FIRST, true);
/// assert_eq!(control.get(), 0b0000_1101);
/// assert!(control.has_more_fragments());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{_0:#04x}")]
pub struct ControlFrame(u8);

impl ControlFrame {
    /// Build a control byte for `fragment`, flagging whether more follow.
    #[must_use]
    pub const fn new(fragment: FragmentNumber, more_fragments: bool) -> Self {
        let more = if more_fragments { MORE_FRAGMENTS_BIT } else { 0 };
        Self((fragment.0 << FRAGMENT_SHIFT) | more | FORMAT_MARKER_BIT)
    }

    /// Interpret a raw control byte received from the wire.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self { Self(raw) }

    /// Return the raw control byte.
    #[must_use]
    pub const fn get(self) -> u8 { self.0 }

    /// Fragment number stored in the upper five bits.
    #[must_use]
    pub const fn fragment_number(self) -> FragmentNumber { FragmentNumber(self.0 >> FRAGMENT_SHIFT) }

    /// Whether further fragments of the same message follow.
    #[must_use]
    pub const fn has_more_fragments(self) -> bool { has_more_fragments(self.0) }

    /// Whether the format marker bit is set.
    #[must_use]
    pub const fn has_format_marker(self) -> bool { self.0 & FORMAT_MARKER_BIT != 0 }

    /// Whether the reserved bit is set; well-formed frames keep it clear.
    #[must_use]
    pub const fn reserved_bit(self) -> bool { self.0 & RESERVED_BIT != 0 }
}

/// Report whether a raw control byte carries the more-fragments flag.
///
/// # Examples
///
/// ```
/// use sdalink::packet::has_more_fragments;
///
/// assert!(has_more_fragments(0b0001_0101));
/// assert!(!has_more_fragments(0b0001_0001));
/// ```
#[must_use]
pub const fn has_more_fragments(control: u8) -> bool { (control >> 2) & 1 == 1 }
