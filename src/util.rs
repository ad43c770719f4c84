use std::fmt::Display;

/// Integer division rounding towards positive infinity.
///
/// # Arguments
/// * `dividend` - The value to divide
/// * `divisor` - The divisor, must be non-zero
///
/// # Returns
/// * `u64` - `ceil(dividend / divisor)`
pub fn ceil_div(dividend: u64, divisor: u64) -> u64 {
    dividend.div_ceil(divisor)
}

/// Number of bits required to represent `value` (0 for zero).
pub fn bits_needed(value: u64) -> u32 {
    u64::BITS - value.leading_zeros()
}

/// Joins displayable values with `", "`.
///
/// Used when reporting lists of offending ids in error messages.
pub fn join<I, T>(values: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    values
        .into_iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod test_util {
    use super::*;

    #[test]
    fn test_ceil_div() {
        assert_eq!(ceil_div(101, 4), 26);
        assert_eq!(ceil_div(100, 4), 25);
        assert_eq!(ceil_div(0, 4), 0);
    }

    #[test]
    fn test_bits_needed() {
        assert_eq!(bits_needed(0), 0);
        assert_eq!(bits_needed(1), 1);
        assert_eq!(bits_needed(255), 8);
        assert_eq!(bits_needed(256), 9);
        assert_eq!(bits_needed(u64::MAX), 64);
    }

    #[test]
    fn test_join() {
        assert_eq!(join([1, 2, 3]), "1, 2, 3");
        assert_eq!(join(Vec::<i64>::new()), "");
    }
}
