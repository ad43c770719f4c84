use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::config::{PROPERTY_PAGE_SHIFT, TARGET_PAGE_SHIFT};
use crate::error::{Error, Result};

/// Address of an allocation: page index in the high 32 bits, offset in the low 32 bits.
#[inline]
pub fn encode_address(page: usize, offset: usize) -> u64 {
    ((page as u64) << 32) | offset as u64
}

/// Splits an address into `(page, offset)`.
#[inline]
pub fn decode_address(address: u64) -> (usize, usize) {
    ((address >> 32) as usize, (address & 0xFFFF_FFFF) as usize)
}

/// Shared paged storage written through per-worker [`Allocator`]s.
///
/// Page indices are reserved from an atomic counter; a page is published into the
/// page table when its allocator freezes it. Allocators never share a page.
pub struct AdjacencyListBuilder<T> {
    page_size: usize,
    next_page: AtomicUsize,
    pages: DashMap<usize, Box<[T]>>,
}

impl AdjacencyListBuilder<u8> {
    /// Builder for compressed target bytes.
    pub fn for_targets() -> Self {
        Self::new(1 << TARGET_PAGE_SHIFT)
    }
}

impl AdjacencyListBuilder<i64> {
    /// Builder for relationship property values.
    pub fn for_properties() -> Self {
        Self::new(1 << PROPERTY_PAGE_SHIFT)
    }
}

impl<T> AdjacencyListBuilder<T>
where
    T: Copy + Default + Send + Sync,
{
    /// # Arguments
    /// * `page_size` - Elements per regular page; larger allocations get a page of their own
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            next_page: AtomicUsize::new(0),
            pages: DashMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Creates an allocator with no current page.
    pub fn allocator(&self) -> Allocator<'_, T> {
        Allocator {
            builder: self,
            page: None,
            page_index: 0,
            capacity: 0,
        }
    }

    /// Collects the published pages in page-index order.
    ///
    /// All allocators borrow the builder, so every page has been frozen by now.
    pub fn build(self) -> Vec<Box<[T]>> {
        let page_count = self.next_page.load(Ordering::Acquire);
        let mut pages = vec![Box::<[T]>::default(); page_count];
        for (index, page) in self.pages {
            pages[index] = page;
        }
        pages
    }
}

/// Bump allocator owning the current page of one worker.
pub struct Allocator<'a, T>
where
    T: Copy + Default + Send + Sync,
{
    builder: &'a AdjacencyListBuilder<T>,
    page: Option<Vec<T>>,
    page_index: usize,
    capacity: usize,
}

impl<T> Allocator<'_, T>
where
    T: Copy + Default + Send + Sync,
{
    /// Reserves `length` contiguous elements.
    ///
    /// An allocation that does not fit into the current page freezes that page and
    /// starts a new one; allocations are never split across pages.
    ///
    /// # Returns
    /// * `Ok((address, slice))` - The address to record and the zeroed slice to fill
    /// * `Err(Error::AllocationFailed)` - A new page could not be reserved
    pub fn allocate(&mut self, length: usize) -> Result<(u64, &mut [T])> {
        let used = self.page.as_ref().map_or(0, Vec::len);
        if self.page.is_none() || self.capacity - used < length {
            self.start_page(length)?;
        }
        let page_index = self.page_index;
        let Some(page) = self.page.as_mut() else {
            return Err(Error::AllocationFailed {
                bytes: length * size_of::<T>(),
            });
        };
        let offset = page.len();
        page.resize(offset + length, T::default());
        Ok((encode_address(page_index, offset), &mut page[offset..]))
    }

    fn start_page(&mut self, length: usize) -> Result<()> {
        self.freeze();
        let capacity = self.builder.page_size.max(length);
        let mut page = Vec::new();
        page.try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailed {
                bytes: capacity * size_of::<T>(),
            })?;
        self.page_index = self.builder.next_page.fetch_add(1, Ordering::AcqRel);
        self.capacity = capacity;
        self.page = Some(page);
        Ok(())
    }

    /// Publishes the current page, if any, to the builder's page table.
    pub fn freeze(&mut self) {
        if let Some(page) = self.page.take() {
            self.builder
                .pages
                .insert(self.page_index, page.into_boxed_slice());
        }
        self.capacity = 0;
    }
}

impl<T> Drop for Allocator<'_, T>
where
    T: Copy + Default + Send + Sync,
{
    fn drop(&mut self) {
        self.freeze();
    }
}
