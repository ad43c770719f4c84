//! Variable-length integer coding used while relationships are being loaded.
//!
//! Targets arrive in insertion order, so consecutive deltas can be negative; they
//! are zig-zag mapped before the 7-bits-per-byte encoding.

/// Maps signed values to unsigned ones so that small magnitudes stay small.
#[inline]
pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Appends `value` using 7 bits per byte, high bit set on all but the last byte.
pub fn encode_vlong(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Reads one value starting at `*position` and advances past it.
pub fn decode_vlong(bytes: &[u8], position: &mut usize) -> u64 {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = bytes[*position];
        *position += 1;
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return value;
        }
        shift += 7;
    }
}

/// Appends `targets` as zig-zag deltas, continuing from `previous`.
///
/// # Returns
/// * `u64` - The last target written, to continue a later append
pub fn encode_deltas(targets: &[u64], previous: u64, out: &mut Vec<u8>) -> u64 {
    let mut last = previous;
    for &target in targets {
        encode_vlong(zigzag(target.wrapping_sub(last) as i64), out);
        last = target;
    }
    last
}

/// Decodes `count` targets written by [`encode_deltas`] starting from 0.
pub fn decode_deltas(bytes: &[u8], count: usize, out: &mut Vec<u64>) {
    let mut position = 0;
    let mut last = 0u64;
    for _ in 0..count {
        let delta = unzigzag(decode_vlong(bytes, &mut position));
        last = last.wrapping_add(delta as u64);
        out.push(last);
    }
}

#[cfg(test)]
mod test_varlong {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
        assert_eq!(zigzag(i64::MIN), u64::MAX);
        assert_eq!(unzigzag(zigzag(-12345)), -12345);
    }

    #[test]
    fn test_vlong_byte_lengths() {
        let mut out = Vec::new();
        encode_vlong(127, &mut out);
        assert_eq!(out.len(), 1);
        encode_vlong(128, &mut out);
        assert_eq!(out.len(), 3);
        let mut position = 0;
        assert_eq!(decode_vlong(&out, &mut position), 127);
        assert_eq!(decode_vlong(&out, &mut position), 128);
        assert_eq!(position, 3);
    }

    #[test]
    fn test_appending_continues_deltas() {
        let mut out = Vec::new();
        let last = encode_deltas(&[10, 3], 0, &mut out);
        encode_deltas(&[7, 7], last, &mut out);
        let mut decoded = Vec::new();
        decode_deltas(&out, 4, &mut decoded);
        assert_eq!(decoded, vec![10, 3, 7, 7]);
    }

    proptest! {
        #[test]
        fn prop_unsorted_targets_survive(targets in prop::collection::vec(0u64..(1 << 40), 0..200)) {
            let mut out = Vec::new();
            encode_deltas(&targets, 0, &mut out);
            let mut decoded = Vec::new();
            decode_deltas(&out, targets.len(), &mut decoded);
            prop_assert_eq!(decoded, targets);
        }
    }
}
