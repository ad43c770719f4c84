use std::sync::Arc;

use crate::adjacency::builder::decode_address;
use crate::adjacency::list::cursor::{AdjacencyCursor, PropertyCursor};
use crate::paged::HugeArray;

pub mod cursor;

/// Compressed, immutable per-node target lists.
///
/// Node `n` owns `degree(n)` ascending targets stored as bit-packed delta blocks at
/// `offsets[n]` in the shared pages.
#[derive(Debug)]
pub struct AdjacencyList {
    degrees: Arc<HugeArray<u64>>,
    offsets: HugeArray<u64>,
    pages: Vec<Box<[u8]>>,
    relationship_count: u64,
}

impl AdjacencyList {
    pub fn new(
        degrees: Arc<HugeArray<u64>>,
        offsets: HugeArray<u64>,
        pages: Vec<Box<[u8]>>,
        relationship_count: u64,
    ) -> Self {
        Self {
            degrees,
            offsets,
            pages,
            relationship_count,
        }
    }

    pub fn node_count(&self) -> u64 {
        self.degrees.len()
    }

    pub fn relationship_count(&self) -> u64 {
        self.relationship_count
    }

    #[inline]
    pub fn degree(&self, node: u64) -> u64 {
        self.degrees.get(node)
    }

    pub fn degrees(&self) -> &Arc<HugeArray<u64>> {
        &self.degrees
    }

    /// A fresh forward-only cursor over the targets of `node`.
    pub fn cursor(&self, node: u64) -> AdjacencyCursor<'_> {
        let degree = self.degree(node);
        if degree == 0 {
            return AdjacencyCursor::empty();
        }
        let (page, offset) = decode_address(self.offsets.get(node));
        AdjacencyCursor::new(&self.pages[page][offset..], degree)
    }

    /// Number of bytes held by the target pages.
    pub fn size_in_bytes(&self) -> usize {
        self.pages.iter().map(|page| page.len()).sum()
    }
}

/// Property values of all nodes, one allocation per node laid out property-major.
#[derive(Debug)]
pub struct PropertyStorage {
    degrees: Arc<HugeArray<u64>>,
    offsets: HugeArray<u64>,
    pages: Vec<Box<[i64]>>,
    property_count: usize,
}

impl PropertyStorage {
    pub fn new(
        degrees: Arc<HugeArray<u64>>,
        offsets: HugeArray<u64>,
        pages: Vec<Box<[i64]>>,
        property_count: usize,
    ) -> Self {
        Self {
            degrees,
            offsets,
            pages,
            property_count,
        }
    }

    pub fn property_count(&self) -> usize {
        self.property_count
    }

    fn values(&self, node: u64, property_index: usize) -> &[i64] {
        let degree = self.degrees.get(node) as usize;
        if degree == 0 {
            return &[];
        }
        let (page, offset) = decode_address(self.offsets.get(node));
        let start = offset + property_index * degree;
        &self.pages[page][start..start + degree]
    }
}

/// View of one property of a [`PropertyStorage`].
#[derive(Debug, Clone)]
pub struct AdjacencyProperties {
    storage: Arc<PropertyStorage>,
    property_index: usize,
}

impl AdjacencyProperties {
    pub fn new(storage: Arc<PropertyStorage>, property_index: usize) -> Self {
        Self {
            storage,
            property_index,
        }
    }

    /// A fresh cursor over the values of `node`, aligned with its target cursor.
    pub fn cursor(&self, node: u64) -> PropertyCursor<'_> {
        PropertyCursor::new(self.storage.values(node, self.property_index))
    }
}
