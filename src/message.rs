//! Binary encoding for operation messages.
//!
//! Device commands travel inside the serial envelope as `bincode` payloads.
//! [`Message`] is implemented for every type that derives `bincode`'s
//! [`Encode`] and [`Decode`](bincode::Decode), so commands gain `to_bytes` and
//! `from_bytes` without any glue.

use bincode::{
    BorrowDecode,
    Encode,
    borrow_decode_from_slice,
    config,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};

/// An operation message with a stable binary form.
///
/// # Examples
///
/// ```
/// use sdalink::{
///     job::{DeviceCommand, Operation},
///     message::Message,
/// };
///
/// let command = DeviceCommand::new(Operation::Read).with_str("config.txt");
/// let bytes = command.to_bytes().expect("encode");
/// let (decoded, used) = DeviceCommand::from_bytes(&bytes).expect("decode");
/// assert_eq!(decoded, command);
/// assert_eq!(used, bytes.len());
/// ```
pub trait Message: Encode + for<'de> BorrowDecode<'de, ()> {
    /// Encode with the standard configuration.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodeError`] if a field cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> { encode_to_vec(self, config::standard()) }

    /// Decode from the front of `bytes`, returning the message and the number
    /// of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for truncated or malformed input.
    fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), DecodeError>
    where
        Self: Sized,
    {
        borrow_decode_from_slice(bytes, config::standard())
    }
}

impl<T> Message for T where for<'de> T: Encode + BorrowDecode<'de, ()> {}
