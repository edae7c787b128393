//! Outbound helper that turns framed messages into MTU-sized writes.
//!
//! [`Fragmenter`] splits an outer message into packet payloads, stamps each
//! chunk with the message's [`SequenceNumber`] and a 1-based
//! [`FragmentNumber`], concatenates the encoded packets, and re-splits the
//! result into transport units no larger than one write. The fragmenter owns
//! the sequence counter, which advances once per message and wraps at 256.
//!
//! Fragment numbers occupy five bits of the control frame. Messages longer
//! than [`FragmentNumber::MAX`] packets keep counting modulo 32, so packet 32
//! carries number 0; the more-fragments flag alone marks the final packet.

use std::collections::{VecDeque, vec_deque};

use bytes::{Bytes, BytesMut};
use log::debug;

use super::{FragmentationError, Mtu, message_chunk_len, transport_unit_len};
use crate::{
    packet::{FragmentNumber, Packet, SequenceNumber},
    splitter,
};

/// Splits outer messages into packets and transport units.
#[derive(Debug, Default)]
pub struct Fragmenter {
    next_sequence: SequenceNumber,
}

impl Fragmenter {
    /// Create a fragmenter whose first message uses sequence number zero.
    #[must_use]
    pub const fn new() -> Self { Self::with_starting_sequence(SequenceNumber::new(0)) }

    /// Create a fragmenter starting from a specific sequence number.
    #[must_use]
    pub const fn with_starting_sequence(start_at: SequenceNumber) -> Self {
        Self {
            next_sequence: start_at,
        }
    }

    /// Sequence number the next message will carry.
    #[must_use]
    pub const fn peek_sequence(&self) -> SequenceNumber { self.next_sequence }

    fn take_sequence(&mut self) -> SequenceNumber {
        let sequence = self.next_sequence;
        self.next_sequence = sequence.next();
        sequence
    }

    /// Fragment `message` for a link with the given `mtu`.
    ///
    /// The sequence counter only advances when fragmentation succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::EmptyMessage`] for an empty message and
    /// [`FragmentationError::MessageTooLarge`] when the message length does
    /// not fit the 16-bit total-size field.
    ///
    /// # Examples
    ///
    /// ```
    /// use sdalink::fragment::{Fragmenter, Mtu};
    ///
    /// let mut fragmenter = Fragmenter::new();
    /// let batch = fragmenter.fragment(vec![0xAB; 500], Mtu::PREFERRED).expect("fragment");
    /// assert_eq!(batch.len(), 3);
    /// assert_eq!(batch.write_queue().total_len(), 500 + 3 * 8);
    /// ```
    pub fn fragment(
        &mut self,
        message: impl Into<Bytes>,
        mtu: Mtu,
    ) -> Result<FragmentBatch, FragmentationError> {
        let chunks = plan_chunks(message.into(), mtu)?;
        let sequence = self.take_sequence();
        build_batch(sequence, &chunks, mtu)
    }

    /// Fragment `message` with an explicit sequence number, leaving the
    /// counter untouched.
    ///
    /// # Errors
    ///
    /// See [`Fragmenter::fragment`].
    pub fn fragment_with_sequence(
        &self,
        sequence: SequenceNumber,
        message: impl Into<Bytes>,
        mtu: Mtu,
    ) -> Result<FragmentBatch, FragmentationError> {
        let chunks = plan_chunks(message.into(), mtu)?;
        build_batch(sequence, &chunks, mtu)
    }
}

struct Chunks {
    total: usize,
    parts: VecDeque<Bytes>,
}

fn plan_chunks(message: Bytes, mtu: Mtu) -> Result<Chunks, FragmentationError> {
    if message.is_empty() {
        return Err(FragmentationError::EmptyMessage);
    }
    let total = message.len();
    if u16::try_from(total).is_err() {
        return Err(FragmentationError::MessageTooLarge { len: total });
    }
    let parts = splitter::split(message, message_chunk_len(total, mtu));
    Ok(Chunks { total, parts })
}

/// Wire fragment number of the packet at zero-based `index`.
fn wire_fragment_number(index: usize) -> u16 {
    let modulus = usize::from(FragmentNumber::MAX) + 1;
    // The remainder is below 32.
    u16::try_from((index + 1) % modulus).unwrap_or_default()
}

fn build_batch(
    sequence: SequenceNumber,
    chunks: &Chunks,
    mtu: Mtu,
) -> Result<FragmentBatch, FragmentationError> {
    let total = u32::try_from(chunks.total).unwrap_or(u32::MAX);
    let last = chunks.parts.len() - 1;
    let mut packets = Vec::with_capacity(chunks.parts.len());
    for (index, chunk) in chunks.parts.iter().enumerate() {
        packets.push(Packet::encode(
            sequence,
            wire_fragment_number(index),
            index != last,
            total,
            false,
            chunk.clone(),
        )?);
    }

    let mut buffer = BytesMut::with_capacity(packets.iter().map(Packet::encoded_len).sum());
    for packet in &packets {
        packet.write_to(&mut buffer);
    }
    let buffer = buffer.freeze();
    let unit_len = transport_unit_len(buffer.len(), mtu);
    let write_queue = WriteQueue::from(splitter::split(buffer, unit_len));
    debug!(
        "fragmented message: sequence={sequence}, len={}, packets={}, units={}, mtu={mtu}",
        chunks.total,
        packets.len(),
        write_queue.len()
    );
    Ok(FragmentBatch {
        sequence,
        packets,
        write_queue,
    })
}

/// FIFO of transport units awaiting transmission, one per acknowledged write.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteQueue(VecDeque<Bytes>);

impl WriteQueue {
    /// Remove the next unit to write.
    pub fn pop(&mut self) -> Option<Bytes> { self.0.pop_front() }

    /// Units still queued.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Whether every unit has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Bytes still queued across all units.
    #[must_use]
    pub fn total_len(&self) -> usize { self.0.iter().map(Bytes::len).sum() }

    /// Iterate the queued units in write order.
    pub fn iter(&self) -> vec_deque::Iter<'_, Bytes> { self.0.iter() }

    /// Concatenate the queued units back into one packet buffer.
    #[must_use]
    pub fn joined(&self) -> Bytes { splitter::join(self.0.iter()) }
}

impl From<VecDeque<Bytes>> for WriteQueue {
    fn from(units: VecDeque<Bytes>) -> Self { Self(units) }
}

impl IntoIterator for WriteQueue {
    type Item = Bytes;
    type IntoIter = vec_deque::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'a> IntoIterator for &'a WriteQueue {
    type Item = &'a Bytes;
    type IntoIter = vec_deque::Iter<'a, Bytes>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

/// Packets and transport units produced for one outer message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    sequence: SequenceNumber,
    packets: Vec<Packet>,
    write_queue: WriteQueue,
}

impl FragmentBatch {
    /// Sequence number shared by every packet.
    #[must_use]
    pub const fn sequence(&self) -> SequenceNumber { self.sequence }

    /// Packets in fragment order.
    #[must_use]
    pub fn packets(&self) -> &[Packet] { self.packets.as_slice() }

    /// Number of packets in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches always hold at least one packet"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.packets.len() }

    /// Whether the message spans more than one packet.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.packets.len() > 1 }

    /// Transport units in write order.
    #[must_use]
    pub fn write_queue(&self) -> &WriteQueue { &self.write_queue }

    /// Consume the batch, returning the transport units.
    #[must_use]
    pub fn into_write_queue(self) -> WriteQueue { self.write_queue }
}
