use crate::loading::adjacency_buffer::AdjacencyBuffer;

/// Relationships buffered by one builder slot before they reach the shared buffer.
#[derive(Debug)]
pub struct LocalRelationshipsBuilder {
    capacity: usize,
    property_count: usize,
    sources: Vec<u64>,
    targets: Vec<u64>,
    properties: Vec<i64>,
    order: Vec<usize>,
}

impl LocalRelationshipsBuilder {
    pub fn new(capacity: usize, property_count: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            property_count,
            sources: Vec::with_capacity(capacity),
            targets: Vec::with_capacity(capacity),
            properties: Vec::with_capacity(capacity * property_count),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Buffers one relationship, flushing into `buffer` once the capacity is reached.
    ///
    /// Property values are stored as their `f64` bit patterns.
    pub fn add(&mut self, source: u64, target: u64, properties: &[f64], buffer: &AdjacencyBuffer) {
        self.sources.push(source);
        self.targets.push(target);
        self.properties.extend(
            properties[..self.property_count]
                .iter()
                .map(|value| value.to_bits() as i64),
        );
        if self.sources.len() >= self.capacity {
            self.flush(buffer);
        }
    }

    /// Sorts the buffered relationships by source and appends them to `buffer`.
    pub fn flush(&mut self, buffer: &AdjacencyBuffer) {
        if self.sources.is_empty() {
            return;
        }
        self.order.clear();
        self.order.extend(0..self.sources.len());
        let sources = &self.sources;
        self.order.sort_by_key(|&index| sources[index]);
        buffer.add_sorted(&self.order, &self.sources, &self.targets, &self.properties);
        self.sources.clear();
        self.targets.clear();
        self.properties.clear();
    }
}

#[cfg(test)]
mod test_local_builder {
    use crate::compress::{Aggregation, PropertyLayout};
    use crate::concurrency::{worker_pool, RUNNING_TRUE};

    use super::*;

    #[test]
    fn test_flushes_when_full() {
        let buffer = AdjacencyBuffer::new(4, 1);
        let mut local = LocalRelationshipsBuilder::new(2, 1);
        local.add(3, 0, &[7.0], &buffer);
        assert_eq!(local.len(), 1);
        local.add(1, 2, &[8.0], &buffer);
        assert!(local.is_empty());
        local.add(3, 1, &[9.0], &buffer);
        local.flush(&buffer);

        let layout = PropertyLayout::new(vec!["w".to_string()], vec![Aggregation::None], Aggregation::None).unwrap();
        let pool = worker_pool(1).unwrap();
        let compressed = buffer.compress(layout, &pool, 1, &RUNNING_TRUE).unwrap();
        assert_eq!(compressed.list.cursor(3).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(compressed.list.cursor(1).collect::<Vec<_>>(), vec![2]);
    }
}
