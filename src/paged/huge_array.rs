use rayon::prelude::*;

use crate::config::PAGE_SHIFT;
use crate::paged::{index_in_page, page_index, page_sizes};

/// A paged array of plain values.
///
/// Written by a single owner (or page-parallel through [`HugeArray::par_set_all`]),
/// read freely once shared.
#[derive(Debug, Clone)]
pub struct HugeArray<T> {
    size: u64,
    pages: Vec<Box<[T]>>,
}

impl<T> HugeArray<T>
where
    T: Copy + Default + Send + Sync,
{
    /// Creates an array of `size` default values.
    pub fn new(size: u64) -> Self {
        let pages = page_sizes(size)
            .map(|page_size| vec![T::default(); page_size].into_boxed_slice())
            .collect();
        Self { size, pages }
    }

    /// Creates an array whose element `i` is `init(i)`, filling pages in parallel.
    pub fn from_fn<F>(size: u64, init: F) -> Self
    where
        F: Fn(u64) -> T + Sync,
    {
        let mut array = Self::new(size);
        array.par_set_all(init);
        array
    }

    /// Number of elements.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Reads element `index`.
    ///
    /// # Panics
    /// If `index >= len()`.
    #[inline]
    pub fn get(&self, index: u64) -> T {
        self.pages[page_index(index)][index_in_page(index)]
    }

    /// Overwrites element `index`.
    #[inline]
    pub fn set(&mut self, index: u64, value: T) {
        self.pages[page_index(index)][index_in_page(index)] = value;
    }

    /// Overwrites every element with `init(i)`; pages are filled in parallel.
    pub fn par_set_all<F>(&mut self, init: F)
    where
        F: Fn(u64) -> T + Sync,
    {
        self.pages
            .par_iter_mut()
            .enumerate()
            .for_each(|(page_id, page)| {
                let base = (page_id as u64) << PAGE_SHIFT;
                for (offset, slot) in page.iter_mut().enumerate() {
                    *slot = init(base + offset as u64);
                }
            });
    }

    /// Iterates the elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.pages.iter().flat_map(|page| page.iter().copied())
    }
}
