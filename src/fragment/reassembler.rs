//! Inbound helper that stitches notification packets into responses.
//!
//! Each notification carries one [`Packet`]. [`Reassembler`] appends payloads
//! while the more-fragments flag is set and yields the response on the first
//! packet with the flag clear, so an unfragmented response completes on its
//! only notification. Fragments of one response must share a sequence number;
//! their fragment numbers are not checked because the firmware does not number
//! responses contiguously.

use std::num::NonZeroUsize;

use bytes::{Bytes, BytesMut};
use log::{debug, warn};

use super::{FragmentationConfig, PayloadBounds, ReassemblyError};
use crate::packet::{Packet, SequenceNumber};

#[derive(Debug)]
struct PartialResponse {
    sequence: SequenceNumber,
    declared_total: u16,
    buffer: BytesMut,
    fragments: usize,
}

/// A complete inbound response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReassembledResponse {
    sequence: SequenceNumber,
    declared_total: u16,
    fragments: usize,
    payload: Bytes,
}

impl ReassembledResponse {
    /// Sequence number shared by the response's packets.
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber { self.sequence }

    /// Total size the final packet's header announced.
    #[must_use]
    pub const fn declared_total(&self) -> u16 { self.declared_total }

    /// Number of packets that formed the response.
    #[must_use]
    pub const fn fragments(&self) -> usize { self.fragments }

    /// Borrow the reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the response, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

/// Stateful single-response reassembler.
#[derive(Debug)]
pub struct Reassembler {
    max_response_size: NonZeroUsize,
    bounds: PayloadBounds,
    partial: Option<PartialResponse>,
}

impl Default for Reassembler {
    fn default() -> Self { Self::new(FragmentationConfig::default()) }
}

impl Reassembler {
    /// Create a reassembler from `config`.
    #[must_use]
    pub fn new(config: FragmentationConfig) -> Self {
        Self {
            max_response_size: config.max_response_size,
            bounds: config.payload_bounds,
            partial: None,
        }
    }

    /// Whether a response is partially assembled.
    #[must_use]
    pub fn is_pending(&self) -> bool { self.partial.is_some() }

    /// Drop any partially assembled response.
    pub fn reset(&mut self) {
        if let Some(partial) = self.partial.take() {
            debug!(
                "discarding partial response: sequence={}, buffered={}",
                partial.sequence,
                partial.buffer.len()
            );
        }
    }

    /// Decode one notification buffer and feed it in.
    ///
    /// Returns `Ok(Some(_))` when the packet completes a response and
    /// `Ok(None)` while more fragments are expected.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::Packet`] for malformed notifications, and
    /// the errors of [`Reassembler::push_packet`].
    ///
    /// # Examples
    ///
    /// ```
    /// use sdalink::{
    ///     fragment::Reassembler,
    ///     packet::{Packet, SequenceNumber},
    /// };
    ///
    /// let mut reassembler = Reassembler::default();
    /// let first = Packet::encode(SequenceNumber::new(4), 1, true, 5, false, b"abc".to_vec())
    ///     .expect("encode");
    /// let last = Packet::encode(SequenceNumber::new(4), 2, false, 5, false, b"de".to_vec())
    ///     .expect("encode");
    /// assert!(reassembler.push(&first.to_bytes()).expect("push").is_none());
    /// let response = reassembler.push(&last.to_bytes()).expect("push").expect("complete");
    /// assert_eq!(response.payload().as_ref(), b"abcde");
    /// ```
    pub fn push(&mut self, raw: &[u8]) -> Result<Option<ReassembledResponse>, ReassemblyError> {
        let decoded = match self.bounds {
            PayloadBounds::HeaderLength => Packet::decode(raw),
            PayloadBounds::DropTrailingByte => Packet::decode_legacy(raw),
        };
        match decoded {
            Ok(packet) => self.push_packet(packet),
            Err(err) => {
                self.reset();
                Err(err.into())
            }
        }
    }

    /// Feed an already decoded packet in.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::SequenceMismatch`] when the packet belongs
    /// to a different response than the one in progress and
    /// [`ReassemblyError::MessageTooLarge`] when the response would exceed the
    /// configured cap. Both discard the partial response.
    pub fn push_packet(
        &mut self,
        packet: Packet,
    ) -> Result<Option<ReassembledResponse>, ReassemblyError> {
        let sequence = packet.sequence();
        let mut partial = match self.partial.take() {
            Some(partial) if partial.sequence != sequence => {
                return Err(ReassemblyError::SequenceMismatch {
                    expected: partial.sequence,
                    found: sequence,
                });
            }
            Some(partial) => partial,
            None => PartialResponse {
                sequence,
                declared_total: packet.total_payload_size(),
                buffer: BytesMut::new(),
                fragments: 0,
            },
        };

        let attempted = partial.buffer.len() + packet.payload().len();
        if attempted > self.max_response_size.get() {
            return Err(ReassemblyError::MessageTooLarge {
                attempted,
                limit: self.max_response_size,
            });
        }
        partial.buffer.extend_from_slice(packet.payload());
        partial.fragments += 1;
        partial.declared_total = packet.total_payload_size();

        if packet.has_more_fragments() {
            self.partial = Some(partial);
            return Ok(None);
        }

        let payload = partial.buffer.freeze();
        if payload.len() != usize::from(partial.declared_total) {
            warn!(
                "response length differs from header total: sequence={sequence}, received={}, \
                 declared={}",
                payload.len(),
                partial.declared_total
            );
        }
        Ok(Some(ReassembledResponse {
            sequence,
            declared_total: partial.declared_total,
            fragments: partial.fragments,
            payload,
        }))
    }
}
