//! Helpers for explicit wire byte-order conversions.
//!
//! The SDA link mixes two byte orders: the packet header stores the total
//! payload size little-endian, while the serial envelope wrapped around each
//! operation message carries a big-endian (network order) length. Keeping the
//! conversions here scopes the Clippy expectations to the conversion points.

/// Serialise a `u16` in little-endian order, as used by the packet header.
///
/// # Examples
///
/// ```
/// use sdalink::byte_order::write_le_u16;
///
/// assert_eq!(write_le_u16(0x1234), [0x34, 0x12]);
/// ```
#[must_use]
pub fn write_le_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The packet header stores sizes little-endian."
    )]
    value.to_le_bytes()
}

/// Parse a little-endian `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use sdalink::byte_order::read_le_u16;
///
/// assert_eq!(read_le_u16([0x34, 0x12]), 0x1234);
/// ```
#[must_use]
pub fn read_le_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The packet header stores sizes little-endian."
    )]
    u16::from_le_bytes(bytes)
}

/// Serialise a `u32` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use sdalink::byte_order::write_network_u32;
///
/// assert_eq!(write_network_u32(0x1234_5678), [0x12, 0x34, 0x56, 0x78]);
/// ```
#[must_use]
pub fn write_network_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "The serial envelope length is in network byte order."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use sdalink::byte_order::read_network_u32;
///
/// assert_eq!(read_network_u32([0x12, 0x34, 0x56, 0x78]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_network_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "The serial envelope length is in network byte order."
    )]
    u32::from_be_bytes(bytes)
}
