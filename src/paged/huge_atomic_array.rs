use std::sync::atomic::{AtomicU64, Ordering};

use crate::paged::{index_in_page, page_index, page_sizes};

/// A paged array of atomic `u64` cells shared between workers.
#[derive(Debug)]
pub struct HugeAtomicU64Array {
    size: u64,
    pages: Vec<Box<[AtomicU64]>>,
}

impl HugeAtomicU64Array {
    /// Creates an array of `size` zeroes.
    pub fn new(size: u64) -> Self {
        Self::from_fn(size, |_| 0)
    }

    /// Creates an array whose element `i` is `init(i)`.
    pub fn from_fn<F>(size: u64, init: F) -> Self
    where
        F: Fn(u64) -> u64,
    {
        let mut base = 0u64;
        let pages = page_sizes(size)
            .map(|page_size| {
                let page = (0..page_size as u64)
                    .map(|offset| AtomicU64::new(init(base + offset)))
                    .collect::<Vec<_>>()
                    .into_boxed_slice();
                base += page_size as u64;
                page
            })
            .collect();
        Self { size, pages }
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    fn cell(&self, index: u64) -> &AtomicU64 {
        &self.pages[page_index(index)][index_in_page(index)]
    }

    /// Atomically reads element `index`.
    #[inline]
    pub fn get(&self, index: u64) -> u64 {
        self.cell(index).load(Ordering::Acquire)
    }

    /// Atomically overwrites element `index`.
    #[inline]
    pub fn set(&self, index: u64, value: u64) {
        self.cell(index).store(value, Ordering::Release);
    }

    /// Replaces element `index` with `new` if it still holds `current`.
    ///
    /// # Returns
    /// * `Ok(current)` - The swap happened
    /// * `Err(actual)` - The value found instead of `current`
    #[inline]
    pub fn compare_exchange(&self, index: u64, current: u64, new: u64) -> Result<u64, u64> {
        self.cell(index)
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }
}

#[cfg(test)]
mod test_huge_atomic_array {
    use crate::config::PAGE_SIZE;

    use super::*;

    #[test]
    fn test_from_fn_and_cas() {
        let size = PAGE_SIZE as u64 + 1;
        let array = HugeAtomicU64Array::from_fn(size, |index| index);
        assert_eq!(array.get(size - 1), size - 1);
        assert_eq!(array.compare_exchange(5, 5, 1), Ok(5));
        assert_eq!(array.compare_exchange(5, 5, 2), Err(1));
        assert_eq!(array.get(5), 1);
    }
}
