use crate::compress::packing::unpack_block;
use crate::config::BLOCK_SIZE;

/// Lazily decodes the ascending targets of one node.
///
/// Finite and forward-only; obtain a new cursor for every traversal.
pub struct AdjacencyCursor<'a> {
    bytes: &'a [u8],
    position: usize,
    remaining: u64,
    block: [u64; BLOCK_SIZE],
    block_len: usize,
    block_position: usize,
    last: u64,
}

impl<'a> AdjacencyCursor<'a> {
    pub(crate) fn new(bytes: &'a [u8], degree: u64) -> Self {
        Self {
            bytes,
            position: 0,
            remaining: degree,
            block: [0; BLOCK_SIZE],
            block_len: 0,
            block_position: 0,
            last: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(&[], 0)
    }

    /// Targets not yet returned.
    pub fn remaining(&self) -> u64 {
        self.remaining + (self.block_len - self.block_position) as u64
    }

    fn decode_block(&mut self) {
        let count = (self.remaining as usize).min(BLOCK_SIZE);
        self.position = unpack_block(self.bytes, self.position, &mut self.block[..count]);
        self.remaining -= count as u64;
        self.block_len = count;
        self.block_position = 0;
    }
}

impl Iterator for AdjacencyCursor<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.block_position == self.block_len {
            if self.remaining == 0 {
                return None;
            }
            self.decode_block();
        }
        // The first value of a list is stored raw, so accumulating from 0 covers it.
        self.last += self.block[self.block_position];
        self.block_position += 1;
        Some(self.last)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AdjacencyCursor<'_> {}

/// Yields the property values of one node in target order.
pub struct PropertyCursor<'a> {
    values: std::slice::Iter<'a, i64>,
}

impl<'a> PropertyCursor<'a> {
    pub(crate) fn new(values: &'a [i64]) -> Self {
        Self {
            values: values.iter(),
        }
    }
}

impl Iterator for PropertyCursor<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        self.values.next().map(|&bits| f64::from_bits(bits as u64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl ExactSizeIterator for PropertyCursor<'_> {}
