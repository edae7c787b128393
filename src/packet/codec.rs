//! Packet encoding and decoding.
//!
//! [`Packet`] is a single wire unit: an 8-byte header followed by up to
//! [`MAX_PAYLOAD_LEN`] payload bytes. Firmware notifications append one
//! trailer byte after the payload; [`Packet::decode`] bounds the payload with
//! the header's length field so the trailer is excluded, while
//! [`PacketCodec`] parses back-to-back packets without trailers, as produced
//! by the send path.

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{
    ControlFrame,
    FragmentNumber,
    HEADER_LEN,
    MAX_PAYLOAD_LEN,
    PacketError,
    SequenceNumber,
};
use crate::byte_order::{read_le_u16, write_le_u16};

/// One SDA link packet.
///
/// # Examples
///
/// ```
/// use sdalink::packet::{Packet, SequenceNumber};
///
/// let packet = Packet::encode(SequenceNumber::new(3), 1, false, 4, false, vec![1, 2, 3, 4])
///     .expect("payload fits one packet");
/// let wire = packet.to_bytes();
/// assert_eq!(&wire[..8], &[3, 0b0000_1001, 4, 4, 0, 0, 0, 0]);
/// assert_eq!(Packet::decode(&wire).expect("decode"), packet);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    sequence: SequenceNumber,
    control: ControlFrame,
    total_payload_size: u16,
    re_requested: bool,
    reserved: [u8; 2],
    payload: Bytes,
}

struct RawHeader {
    sequence: u8,
    control: u8,
    length: usize,
    total_payload_size: u16,
    re_requested: bool,
    reserved: [u8; 2],
}

impl RawHeader {
    fn parse(raw: &[u8]) -> Result<Self, PacketError> {
        let Some(&[
            sequence,
            control,
            length,
            total_lo,
            total_hi,
            re_requested,
            reserved_lo,
            reserved_hi,
        ]) = raw.first_chunk::<HEADER_LEN>()
        else {
            return Err(PacketError::TooShort { len: raw.len() });
        };
        let length = usize::from(length);
        if length > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge { len: length });
        }
        Ok(Self {
            sequence,
            control,
            length,
            total_payload_size: read_le_u16([total_lo, total_hi]),
            re_requested: re_requested != 0,
            reserved: [reserved_lo, reserved_hi],
        })
    }

    fn into_packet(self, payload: Bytes) -> Packet {
        Packet {
            sequence: SequenceNumber::new(self.sequence),
            control: ControlFrame::from_raw(self.control),
            total_payload_size: self.total_payload_size,
            re_requested: self.re_requested,
            reserved: self.reserved,
            payload,
        }
    }
}

impl Packet {
    /// Build a packet for one fragment of an outer message.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::PayloadTooLarge`] when `payload` exceeds
    /// [`MAX_PAYLOAD_LEN`], [`PacketError::FragmentNumberOutOfRange`] when
    /// `fragment_number` exceeds [`FragmentNumber::MAX`], and
    /// [`PacketError::TotalSizeOutOfRange`] when `total_payload_size` does not
    /// fit 16 bits.
    pub fn encode(
        sequence: SequenceNumber,
        fragment_number: u16,
        more_fragments: bool,
        total_payload_size: u32,
        re_requested: bool,
        payload: impl Into<Bytes>,
    ) -> Result<Self, PacketError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge { len: payload.len() });
        }
        let fragment = u8::try_from(fragment_number)
            .ok()
            .and_then(FragmentNumber::new)
            .ok_or(PacketError::FragmentNumberOutOfRange(fragment_number))?;
        let total = u16::try_from(total_payload_size)
            .map_err(|_| PacketError::TotalSizeOutOfRange(total_payload_size))?;
        Ok(Self {
            sequence,
            control: ControlFrame::new(fragment, more_fragments),
            total_payload_size: total,
            re_requested,
            reserved: [0, 0],
            payload,
        })
    }

    /// Decode one packet from an inbound notification buffer.
    ///
    /// The payload spans the `packet_length` bytes after the header; any
    /// trailing bytes are treated as the firmware trailer and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::TooShort`] for buffers shorter than the header,
    /// [`PacketError::PayloadTooLarge`] when the declared length exceeds the
    /// ceiling, and [`PacketError::Truncated`] when fewer payload bytes follow
    /// than declared.
    pub fn decode(raw: &[u8]) -> Result<Self, PacketError> {
        let header = RawHeader::parse(raw)?;
        let available = raw.len() - HEADER_LEN;
        let end = HEADER_LEN + header.length;
        let Some(payload) = raw.get(HEADER_LEN..end) else {
            return Err(PacketError::Truncated {
                declared: header.length,
                available,
            });
        };
        let payload = Bytes::copy_from_slice(payload);
        Ok(header.into_packet(payload))
    }

    /// Decode using the legacy slice `raw[8 .. raw.len() - 1]`.
    ///
    /// The header's length field is ignored and the final buffer byte is
    /// always dropped. Only useful against firmware that fills the length
    /// field inconsistently.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::TooShort`] when the buffer cannot hold the
    /// header plus the dropped byte, and [`PacketError::PayloadTooLarge`] when
    /// the sliced payload exceeds the ceiling.
    pub fn decode_legacy(raw: &[u8]) -> Result<Self, PacketError> {
        if raw.len() <= HEADER_LEN {
            return Err(PacketError::TooShort { len: raw.len() });
        }
        let header = RawHeader::parse(raw)?;
        let payload = raw.get(HEADER_LEN..raw.len() - 1).unwrap_or_default();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge { len: payload.len() });
        }
        Ok(header.into_packet(Bytes::copy_from_slice(payload)))
    }

    /// Sequence number of the outer message.
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber { self.sequence }

    /// Raw control frame.
    #[must_use]
    pub const fn control(&self) -> ControlFrame { self.control }

    /// Fragment number decoded from the control frame.
    #[must_use]
    pub const fn fragment_number(&self) -> FragmentNumber { self.control.fragment_number() }

    /// Whether further fragments of the same message follow.
    #[must_use]
    pub const fn has_more_fragments(&self) -> bool { self.control.has_more_fragments() }

    /// Payload length as stored in the header.
    #[must_use]
    pub fn packet_length(&self) -> u8 {
        // Construction caps the payload at MAX_PAYLOAD_LEN, which fits a byte.
        u8::try_from(self.payload.len()).unwrap_or(u8::MAX)
    }

    /// Size of the whole outer message this packet belongs to.
    #[must_use]
    pub const fn total_payload_size(&self) -> u16 { self.total_payload_size }

    /// Retransmission marker.
    #[must_use]
    pub const fn is_re_requested(&self) -> bool { self.re_requested }

    /// Reserved header bytes.
    #[must_use]
    pub const fn reserved(&self) -> [u8; 2] { self.reserved }

    /// Borrow the payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the packet, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Number of bytes this packet occupies on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize { HEADER_LEN + self.payload.len() }

    /// Append the header and payload to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        let [total_lo, total_hi] = write_le_u16(self.total_payload_size);
        dst.reserve(self.encoded_len());
        dst.put_u8(self.sequence.get());
        dst.put_u8(self.control.get());
        dst.put_u8(self.packet_length());
        dst.put_u8(total_lo);
        dst.put_u8(total_hi);
        dst.put_u8(u8::from(self.re_requested));
        dst.put_slice(&self.reserved);
        dst.put_slice(&self.payload);
    }

    /// Serialise the packet into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

/// Stream codec for back-to-back packets without trailers.
///
/// Decoding yields `Ok(None)` until a full packet is buffered. Malformed
/// headers surface as [`io::ErrorKind::InvalidData`] wrapping a
/// [`PacketError`].
#[derive(Clone, Copy, Debug, Default)]
pub struct PacketCodec;

fn invalid_data(err: PacketError) -> io::Error { io::Error::new(io::ErrorKind::InvalidData, err) }

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let header = RawHeader::parse(src).map_err(invalid_data)?;
        let frame_len = HEADER_LEN + header.length;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }
        let frame = src.split_to(frame_len).freeze();
        Ok(Some(header.into_packet(frame.slice(HEADER_LEN..))))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst);
        Ok(())
    }
}

impl Encoder<&Packet> for PacketCodec {
    type Error = io::Error;

    fn encode(&mut self, item: &Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write_to(dst);
        Ok(())
    }
}
