use std::mem;
use std::sync::{Mutex, MutexGuard};

use rayon::ThreadPool;
use tracing::debug;

use crate::batch::{Batch, BatchQueue};
use crate::compress::{AdjacencyCompressorFactory, CompressedAdjacency, PropertyLayout};
use crate::concurrency::TerminationFlag;
use crate::config::BUFFER_PAGE_SHIFT;
use crate::error::Result;
use crate::loading::chunked::ChunkedAdjacencyLists;

const PAGE_NODES: u64 = 1 << BUFFER_PAGE_SHIFT;

/// Page-locked staging area between local builders and the compressor.
///
/// Nodes are grouped in pages of `2^BUFFER_PAGE_SHIFT`; each page sits behind its
/// own mutex so flushes from different slots only contend on shared pages.
pub struct AdjacencyBuffer {
    node_count: u64,
    property_count: usize,
    pages: Vec<Mutex<ChunkedAdjacencyLists>>,
}

impl AdjacencyBuffer {
    pub fn new(node_count: u64, property_count: usize) -> Self {
        let pages = (0..node_count)
            .step_by(PAGE_NODES as usize)
            .map(|start| {
                let nodes = PAGE_NODES.min(node_count - start) as usize;
                Mutex::new(ChunkedAdjacencyLists::new(nodes, property_count))
            })
            .collect();
        Self {
            node_count,
            property_count,
            pages,
        }
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn lock(&self, page: usize) -> MutexGuard<'_, ChunkedAdjacencyLists> {
        self.pages[page]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends relationships given in ascending source order.
    ///
    /// # Arguments
    /// * `order` - Indices into `sources`/`targets`, sorted by source
    /// * `properties` - Flat values, `property_count` per relationship index
    pub fn add_sorted(&self, order: &[usize], sources: &[u64], targets: &[u64], properties: &[i64]) {
        let width = self.property_count;
        let mut position = 0;
        while position < order.len() {
            let page = (sources[order[position]] >> BUFFER_PAGE_SHIFT) as usize;
            let mut lists = self.lock(page);
            while position < order.len() {
                let index = order[position];
                let source = sources[index];
                if (source >> BUFFER_PAGE_SHIFT) as usize != page {
                    break;
                }
                let local = (source & (PAGE_NODES - 1)) as usize;
                lists.add(local, targets[index], &properties[index * width..(index + 1) * width]);
                position += 1;
            }
        }
    }

    /// Compresses every buffered list, one page per batch, and releases the buffer.
    pub fn compress(
        &self,
        layout: PropertyLayout,
        pool: &ThreadPool,
        concurrency: usize,
        termination: &dyn TerminationFlag,
    ) -> Result<CompressedAdjacency> {
        let factory = AdjacencyCompressorFactory::new(self.node_count, layout);
        let queue = BatchQueue::from_partitions(
            (0..self.pages.len() as u64)
                .map(|page| Batch::new(page, 1))
                .collect(),
        );
        queue.parallel_consume_in(pool, concurrency, termination, |batch| {
            let mut compressor = factory.compressor();
            for page in batch.element_ids() {
                let mut lists = mem::take(&mut *self.lock(page as usize));
                let base = page << BUFFER_PAGE_SHIFT;
                for local in 0..lists.node_count() {
                    let (mut targets, mut properties) = lists.take(local);
                    compressor.compress(base + local as u64, &mut targets, &mut properties, None)?;
                }
            }
            Ok(())
        })?;
        let compressed = factory.build();
        debug!(
            nodes = self.node_count,
            relationships = compressed.list.relationship_count(),
            bytes = compressed.list.size_in_bytes(),
            "compressed adjacency buffer"
        );
        Ok(compressed)
    }
}
