//! Huge arrays split into fixed-size pages.
//!
//! Every array in this module is indexed by `u64` and backed by pages of
//! [`PAGE_SIZE`] elements, so a single array never needs one contiguous allocation.

use crate::config::{PAGE_SHIFT, PAGE_SIZE};

pub mod huge_array;
pub mod huge_atomic_array;

pub use huge_array::HugeArray;
pub use huge_atomic_array::HugeAtomicU64Array;

const PAGE_MASK: u64 = (PAGE_SIZE - 1) as u64;

/// Index of the page holding element `index`.
#[inline]
pub(crate) fn page_index(index: u64) -> usize {
    (index >> PAGE_SHIFT) as usize
}

/// Position of element `index` inside its page.
#[inline]
pub(crate) fn index_in_page(index: u64) -> usize {
    (index & PAGE_MASK) as usize
}

/// Sizes of the pages needed to hold `size` elements; only the last page may be short.
pub(crate) fn page_sizes(size: u64) -> impl Iterator<Item = usize> {
    let full_pages = (size >> PAGE_SHIFT) as usize;
    let remainder = index_in_page(size);
    std::iter::repeat(PAGE_SIZE)
        .take(full_pages)
        .chain((remainder > 0).then_some(remainder))
}

#[cfg(test)]
mod test_paged {
    use super::*;

    #[test]
    fn test_page_addressing() {
        let index = (3u64 << PAGE_SHIFT) + 17;
        assert_eq!(page_index(index), 3);
        assert_eq!(index_in_page(index), 17);
    }

    #[test]
    fn test_page_sizes() {
        assert_eq!(page_sizes(0).count(), 0);
        assert_eq!(page_sizes(PAGE_SIZE as u64).collect::<Vec<_>>(), vec![PAGE_SIZE]);
        assert_eq!(
            page_sizes(PAGE_SIZE as u64 + 5).collect::<Vec<_>>(),
            vec![PAGE_SIZE, 5]
        );
    }
}
