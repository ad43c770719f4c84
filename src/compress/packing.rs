//! Block bit-packing of sorted delta sequences.
//!
//! Values are grouped in blocks of [`BLOCK_SIZE`]. Each block starts with one header
//! byte holding its bit width (0..=64), followed by the values packed little-endian
//! at that width. A block of width 0 has no payload.

use crate::config::BLOCK_SIZE;
use crate::util::{bits_needed, ceil_div};

/// Bytes needed to pack `values`.
pub fn packed_len(values: &[u64]) -> usize {
    values
        .chunks(BLOCK_SIZE)
        .map(|block| {
            let width = block_width(block) as u64;
            1 + ceil_div(block.len() as u64 * width, 8) as usize
        })
        .sum()
}

fn block_width(block: &[u64]) -> u32 {
    bits_needed(block.iter().fold(0, |acc, &value| acc | value))
}

/// Appends the packed blocks of `values` to `out`.
pub fn pack(values: &[u64], out: &mut Vec<u8>) {
    for block in values.chunks(BLOCK_SIZE) {
        let width = block_width(block);
        out.push(width as u8);
        if width == 0 {
            continue;
        }
        let mut buffer = 0u128;
        let mut buffered = 0u32;
        for &value in block {
            buffer |= u128::from(value) << buffered;
            buffered += width;
            while buffered >= 8 {
                out.push(buffer as u8);
                buffer >>= 8;
                buffered -= 8;
            }
        }
        if buffered > 0 {
            out.push(buffer as u8);
        }
    }
}

/// Unpacks one block of `out.len()` values starting at `position`.
///
/// # Returns
/// * `usize` - Position right after the block
pub fn unpack_block(bytes: &[u8], mut position: usize, out: &mut [u64]) -> usize {
    let width = u32::from(bytes[position]);
    position += 1;
    if width == 0 {
        out.fill(0);
        return position;
    }
    let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
    let mut buffer = 0u128;
    let mut buffered = 0u32;
    for slot in out.iter_mut() {
        while buffered < width {
            buffer |= u128::from(bytes[position]) << buffered;
            position += 1;
            buffered += 8;
        }
        *slot = buffer as u64 & mask;
        buffer >>= width;
        buffered -= width;
    }
    position
}

#[cfg(test)]
mod test_packing {
    use proptest::prelude::*;

    use super::*;

    fn unpack_all(bytes: &[u8], count: usize) -> Vec<u64> {
        let mut values = vec![0u64; count];
        let mut position = 0;
        for block in values.chunks_mut(BLOCK_SIZE) {
            position = unpack_block(bytes, position, block);
        }
        assert_eq!(position, bytes.len());
        values
    }

    #[test]
    fn test_header_byte_holds_width() {
        let mut out = Vec::new();
        pack(&[5, 1, 7], &mut out);
        assert_eq!(out[0], 3);
        assert_eq!(out.len(), 1 + 2);
        assert_eq!(packed_len(&[5, 1, 7]), out.len());
    }

    #[test]
    fn test_zero_width_block() {
        let mut out = Vec::new();
        pack(&[0; 10], &mut out);
        assert_eq!(out, vec![0]);
        assert_eq!(unpack_all(&out, 10), vec![0; 10]);
    }

    #[test]
    fn test_full_width_values() {
        let values = vec![u64::MAX, 0, 1 << 63];
        let mut out = Vec::new();
        pack(&values, &mut out);
        assert_eq!(out[0], 64);
        assert_eq!(unpack_all(&out, values.len()), values);
    }

    proptest! {
        #[test]
        fn prop_pack_unpack(values in prop::collection::vec(any::<u64>().prop_map(|v| v >> (v % 64)), 0..300)) {
            let mut out = Vec::new();
            pack(&values, &mut out);
            prop_assert_eq!(out.len(), packed_len(&values));
            prop_assert_eq!(unpack_all(&out, values.len()), values);
        }
    }
}
