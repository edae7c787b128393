//! Fixed-size chunking of byte buffers.
//!
//! [`split`] partitions a buffer into equally sized chunks with a short final
//! chunk, and [`join`] concatenates them back. Both the fragmenter (message
//! chunks) and the write queue (transport units) are built on these helpers.
//! Chunks are zero-copy slices of a single [`Bytes`] allocation.

use std::{collections::VecDeque, num::NonZeroUsize};

use bytes::{Bytes, BytesMut};

/// Split `buffer` into chunks of `chunk_size` bytes.
///
/// Every chunk has length `chunk_size` except the last, which holds the
/// remainder (or a full chunk when the length divides evenly). An empty buffer
/// yields an empty queue.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use sdalink::splitter::split;
///
/// let chunks = split(vec![1_u8, 2, 3, 4, 5], NonZeroUsize::new(2).expect("non-zero"));
/// let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
/// assert_eq!(lens, vec![2, 2, 1]);
/// ```
#[must_use]
pub fn split(buffer: impl Into<Bytes>, chunk_size: NonZeroUsize) -> VecDeque<Bytes> {
    let buffer: Bytes = buffer.into();
    let size = chunk_size.get();
    let mut chunks = VecDeque::with_capacity(buffer.len().div_ceil(size));
    let mut offset = 0usize;
    while offset < buffer.len() {
        let end = (offset + size).min(buffer.len());
        chunks.push_back(buffer.slice(offset..end));
        offset = end;
    }
    chunks
}

/// Concatenate `chunks` in queue order.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use sdalink::splitter::{join, split};
///
/// let original = b"secure device access".to_vec();
/// let chunks = split(original.clone(), NonZeroUsize::new(6).expect("non-zero"));
/// assert_eq!(join(&chunks), original);
/// ```
#[must_use]
pub fn join<'a>(chunks: impl IntoIterator<Item = &'a Bytes>) -> Bytes {
    let mut out = BytesMut::new();
    for chunk in chunks {
        out.extend_from_slice(chunk);
    }
    out.freeze()
}
