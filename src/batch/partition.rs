use std::ops::Range;

use crate::config::MAX_BATCH_SIZE;
use crate::util::ceil_div;

/// The half-open element range `[start, start + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Batch {
    start: u64,
    size: u64,
}

impl Batch {
    pub fn new(start: u64, size: u64) -> Self {
        Self { start, size }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Exclusive end of the range.
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Element ids of this batch in ascending order, produced lazily.
    pub fn element_ids(&self) -> Range<u64> {
        self.start..self.end()
    }
}

/// Batch size for splitting `total` elements among `concurrency` workers.
///
/// `max(min_batch_size, ceil(total / concurrency))`, capped at `i32::MAX`.
pub fn batch_size_for(total: u64, min_batch_size: u64, concurrency: usize) -> u64 {
    let per_worker = ceil_div(total, concurrency.max(1) as u64);
    per_worker.max(min_batch_size).clamp(1, MAX_BATCH_SIZE)
}

/// Splits `[0, node_count)` into equally sized partitions; only the last may be shorter.
///
/// # Arguments
/// * `concurrency` - Number of workers the partitions are meant for
/// * `node_count` - Number of elements to cover
/// * `min_batch_size` - Lower bound on the partition size
pub fn range_partition(concurrency: usize, node_count: u64, min_batch_size: u64) -> Vec<Batch> {
    let batch_size = batch_size_for(node_count, min_batch_size, concurrency);
    (0..node_count)
        .step_by(batch_size as usize)
        .map(|start| Batch::new(start, batch_size.min(node_count - start)))
        .collect()
}

/// Splits `[0, node_count)` into partitions of roughly equal relationship volume.
///
/// Walks the nodes in order, summing `degree(node)`, and closes a partition as soon
/// as the sum reaches `max(min_batch_size, ceil(relationship_count / concurrency))`.
/// Partitions are consecutive, disjoint and cover every node.
pub fn degree_partition<F>(
    node_count: u64,
    relationship_count: u64,
    degree: F,
    concurrency: usize,
    min_batch_size: u64,
) -> Vec<Batch>
where
    F: Fn(u64) -> u64,
{
    let target = batch_size_for(relationship_count, min_batch_size, concurrency);
    let mut partitions = Vec::new();
    let mut start = 0u64;
    let mut volume = 0u64;
    for node in 0..node_count {
        volume += degree(node);
        if volume >= target {
            partitions.push(Batch::new(start, node + 1 - start));
            start = node + 1;
            volume = 0;
        }
    }
    if start < node_count {
        partitions.push(Batch::new(start, node_count - start));
    }
    partitions
}

#[cfg(test)]
mod test_partition {
    use proptest::prelude::*;

    use super::*;

    fn assert_covers(partitions: &[Batch], node_count: u64) {
        let mut expected_start = 0;
        for batch in partitions {
            assert_eq!(batch.start(), expected_start);
            assert!(!batch.is_empty());
            expected_start = batch.end();
        }
        assert_eq!(expected_start, node_count);
    }

    #[test]
    fn test_range_partition_sizes() {
        let partitions = range_partition(4, 101, 1);
        let sizes = partitions.iter().map(Batch::size).collect::<Vec<_>>();
        assert_eq!(sizes, vec![26, 26, 26, 23]);
    }

    #[test]
    fn test_degree_partition_balances_volume() {
        // One heavy node followed by many light ones.
        let degrees = [90u64, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let total = degrees.iter().sum();
        let partitions = degree_partition(degrees.len() as u64, total, |n| degrees[n as usize], 2, 1);
        assert_covers(&partitions, degrees.len() as u64);
        assert_eq!(partitions[0], Batch::new(0, 1));
    }

    #[test]
    fn test_degree_partition_without_relationships() {
        let partitions = degree_partition(5, 0, |_| 0, 4, 1);
        assert_eq!(partitions, vec![Batch::new(0, 5)]);
    }

    proptest! {
        #[test]
        fn prop_range_partition_covers(node_count in 0u64..10_000, concurrency in 1usize..16, min in 1u64..500) {
            let partitions = range_partition(concurrency, node_count, min);
            assert_covers(&partitions, node_count);
            if let Some((last, full)) = partitions.split_last() {
                let per_worker = (node_count + concurrency as u64 - 1) / concurrency as u64;
                let expected = per_worker.max(min);
                for batch in full {
                    prop_assert_eq!(batch.size(), expected);
                    prop_assert!(batch.size() >= min);
                }
                prop_assert!(last.size() >= 1 && last.size() <= expected);
                if min <= per_worker {
                    prop_assert!(partitions.len() <= concurrency);
                } else {
                    prop_assert_eq!(partitions.len() as u64, (node_count + min - 1) / min);
                }
            }
        }

        #[test]
        fn prop_degree_partition_covers(degrees in prop::collection::vec(0u64..50, 0..500), concurrency in 1usize..8) {
            let total = degrees.iter().sum();
            let partitions = degree_partition(degrees.len() as u64, total, |n| degrees[n as usize], concurrency, 1);
            assert_covers(&partitions, degrees.len() as u64);
        }
    }
}
