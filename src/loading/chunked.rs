use std::mem;

use crate::compress::varlong::{decode_deltas, encode_deltas};

/// Semi-compressed relationship lists of the nodes of one buffer page.
///
/// Targets are appended as zig-zag varlong deltas in insertion order; property
/// values are kept raw next to them.
#[derive(Debug, Default)]
pub struct ChunkedAdjacencyLists {
    targets: Vec<Vec<u8>>,
    last_targets: Vec<u64>,
    counts: Vec<usize>,
    properties: Vec<Vec<Vec<i64>>>,
}

impl ChunkedAdjacencyLists {
    /// # Arguments
    /// * `node_count` - Nodes covered by this page
    /// * `property_count` - Values stored per relationship
    pub fn new(node_count: usize, property_count: usize) -> Self {
        Self {
            targets: vec![Vec::new(); node_count],
            last_targets: vec![0; node_count],
            counts: vec![0; node_count],
            properties: vec![vec![Vec::new(); node_count]; property_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.counts.len()
    }

    /// Appends one relationship of page-local node `local`.
    pub fn add(&mut self, local: usize, target: u64, properties: &[i64]) {
        self.last_targets[local] =
            encode_deltas(&[target], self.last_targets[local], &mut self.targets[local]);
        self.counts[local] += 1;
        for (values, &value) in self.properties.iter_mut().zip(properties) {
            values[local].push(value);
        }
    }

    /// Number of relationships buffered for `local`.
    pub fn count(&self, local: usize) -> usize {
        self.counts[local]
    }

    /// Decodes and releases the relationships of `local`.
    ///
    /// # Returns
    /// * `(targets, properties)` - Targets in insertion order and one value array per property
    pub fn take(&mut self, local: usize) -> (Vec<u64>, Vec<Vec<i64>>) {
        let bytes = mem::take(&mut self.targets[local]);
        let count = mem::take(&mut self.counts[local]);
        self.last_targets[local] = 0;
        let mut targets = Vec::with_capacity(count);
        decode_deltas(&bytes, count, &mut targets);
        let properties = self
            .properties
            .iter_mut()
            .map(|values| mem::take(&mut values[local]))
            .collect();
        (targets, properties)
    }
}

#[cfg(test)]
mod test_chunked {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let mut lists = ChunkedAdjacencyLists::new(2, 1);
        lists.add(1, 9, &[10]);
        lists.add(1, 2, &[20]);
        lists.add(1, 9, &[30]);
        assert_eq!(lists.count(0), 0);
        assert_eq!(lists.count(1), 3);
        let (targets, properties) = lists.take(1);
        assert_eq!(targets, vec![9, 2, 9]);
        assert_eq!(properties, vec![vec![10, 20, 30]]);
        assert_eq!(lists.count(1), 0);
    }
}
