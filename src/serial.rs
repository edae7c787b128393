//! Serial protocol envelope wrapped around each operation message.
//!
//! The peripheral firmware expects every operation message to be framed as
//!
//! ```text
//! BOM ("mbeddbap") | length (u32, network order) | message | SHA-256(message)
//! ```
//!
//! before it is fragmented into packets. [`frame`] builds the envelope and
//! [`unframe`] validates and strips it again, which the simulated device uses
//! to recover the operation message it was sent.

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::byte_order::{read_network_u32, write_network_u32};

/// Byte-order mark opening every serial message.
pub const BOM: [u8; 8] = *b"mbeddbap";

/// Size of the length prefix following the BOM.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Size of the trailing SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Bytes the envelope adds around the operation message.
pub const ENVELOPE_OVERHEAD: usize = BOM.len() + LENGTH_PREFIX_LEN + DIGEST_LEN;

/// Errors raised while framing or unframing serial messages.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SerialError {
    /// The operation message does not fit the 32-bit length prefix.
    #[error("operation message of {0} bytes exceeds the envelope length prefix")]
    MessageTooLarge(usize),
    /// The buffer is shorter than an empty envelope.
    #[error("serial message of {len} bytes is shorter than the envelope ({min} bytes)", min = ENVELOPE_OVERHEAD)]
    TooShort { len: usize },
    /// The buffer does not start with the byte-order mark.
    #[error("serial message does not start with the mbeddbap marker")]
    MissingBom,
    /// The length prefix disagrees with the buffer size.
    #[error("serial message declares {declared} bytes but carries {actual}")]
    LengthMismatch { declared: u32, actual: usize },
    /// The trailing digest does not match the message.
    #[error("serial message digest mismatch")]
    DigestMismatch,
}

fn digest(message: &[u8]) -> [u8; DIGEST_LEN] { Sha256::digest(message).into() }

/// Wrap an operation message in the serial envelope.
///
/// # Errors
///
/// Returns [`SerialError::MessageTooLarge`] when the message length does not
/// fit the 32-bit prefix.
///
/// # Examples
///
/// ```
/// use sdalink::serial::{BOM, ENVELOPE_OVERHEAD, frame};
///
/// let framed = frame(b"\x01\x02").expect("small message");
/// assert_eq!(framed.len(), 46);
/// assert_eq!(framed.len(), 2 + ENVELOPE_OVERHEAD);
/// assert_eq!(&framed[..8], &BOM);
/// assert_eq!(&framed[8..12], &[0, 0, 0, 2]);
/// ```
pub fn frame(message: &[u8]) -> Result<Bytes, SerialError> {
    let len =
        u32::try_from(message.len()).map_err(|_| SerialError::MessageTooLarge(message.len()))?;
    let mut buf = BytesMut::with_capacity(message.len() + ENVELOPE_OVERHEAD);
    buf.put_slice(&BOM);
    buf.put_slice(&write_network_u32(len));
    buf.put_slice(message);
    buf.put_slice(&digest(message));
    Ok(buf.freeze())
}

/// Validate a serial envelope and return the operation message inside it.
///
/// # Errors
///
/// Returns a [`SerialError`] when the marker, length prefix or digest do not
/// check out.
pub fn unframe(raw: &[u8]) -> Result<Bytes, SerialError> {
    if raw.len() < ENVELOPE_OVERHEAD {
        return Err(SerialError::TooShort { len: raw.len() });
    }
    let (bom, rest) = raw.split_at(BOM.len());
    if bom != BOM {
        return Err(SerialError::MissingBom);
    }
    let (prefix, rest) = rest.split_at(LENGTH_PREFIX_LEN);
    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(prefix);
    let declared = read_network_u32(len_bytes);
    let actual = rest.len() - DIGEST_LEN;
    if usize::try_from(declared).ok() != Some(actual) {
        return Err(SerialError::LengthMismatch { declared, actual });
    }
    let (message, trailer) = rest.split_at(actual);
    if digest(message) != trailer {
        return Err(SerialError::DigestMismatch);
    }
    Ok(Bytes::copy_from_slice(message))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn digest_is_sha256_of_message() {
        let framed = frame(b"abc").expect("frame");
        assert_eq!(
            &framed[framed.len() - DIGEST_LEN..],
            &[
                0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
                0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
                0xf2, 0x00, 0x15, 0xad,
            ]
        );
    }

    #[test]
    fn unframe_recovers_message() {
        let framed = frame(b"read-data").expect("frame");
        assert_eq!(unframe(&framed).expect("unframe").as_ref(), b"read-data");
    }

    #[test]
    fn empty_message_frames_to_bare_envelope() {
        let framed = frame(&[]).expect("frame");
        assert_eq!(framed.len(), ENVELOPE_OVERHEAD);
        assert!(unframe(&framed).expect("unframe").is_empty());
    }

    #[rstest]
    #[case::bom(0, SerialError::MissingBom)]
    #[case::digest(14, SerialError::DigestMismatch)]
    fn corruption_is_detected(#[case] index: usize, #[case] expected: SerialError) {
        let mut framed = frame(b"hello").expect("frame").to_vec();
        framed[index] ^= 0x01;
        assert_eq!(unframe(&framed), Err(expected));
    }

    #[test]
    fn length_prefix_must_match_body() {
        let mut framed = frame(b"hello").expect("frame").to_vec();
        framed[11] = 6;
        assert_eq!(
            unframe(&framed),
            Err(SerialError::LengthMismatch {
                declared: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert_eq!(
            unframe(&BOM),
            Err(SerialError::TooShort { len: BOM.len() })
        );
    }
}
