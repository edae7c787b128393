//! Error types emitted by the fragmentation layer.

use std::num::NonZeroUsize;

use thiserror::Error;

use crate::packet::{PacketError, SequenceNumber};

/// Errors produced while fragmenting outbound messages.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// Nothing to send.
    #[error("cannot fragment an empty message")]
    EmptyMessage,
    /// The message is too long for the 16-bit total-size header field.
    #[error("message of {len} bytes exceeds the {max}-byte total-size field", max = u16::MAX)]
    MessageTooLarge { len: usize },
    /// A chunk could not be encoded as a packet.
    #[error(transparent)]
    Packet(#[from] PacketError),
}

/// Errors produced while reassembling inbound responses.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The notification is not a valid packet.
    #[error("malformed notification: {0}")]
    Packet(#[from] PacketError),
    /// A fragment belongs to a different response than the one in progress.
    #[error("fragment sequence mismatch: expected {expected}, found {found}")]
    SequenceMismatch {
        expected: SequenceNumber,
        found: SequenceNumber,
    },
    /// The response grew past the configured cap.
    #[error("response of {attempted} bytes exceeds the {limit}-byte cap")]
    MessageTooLarge {
        attempted: usize,
        limit: NonZeroUsize,
    },
}
