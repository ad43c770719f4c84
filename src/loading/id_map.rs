use dashmap::DashSet;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Maps original node ids onto the dense internal space `[0, node_count)`.
///
/// Ids outside the mapped set resolve to `None`.
pub trait PartialIdMap: Send + Sync {
    fn to_mapped_node_id(&self, original_node_id: i64) -> Option<u64>;

    /// Size of the internal id space.
    fn node_count(&self) -> u64;
}

/// Identity mapping over `[0, node_count)`.
#[derive(Debug, Clone, Copy)]
pub struct DirectIdMap {
    node_count: u64,
}

impl DirectIdMap {
    pub fn new(node_count: u64) -> Self {
        Self { node_count }
    }
}

impl PartialIdMap for DirectIdMap {
    fn to_mapped_node_id(&self, original_node_id: i64) -> Option<u64> {
        u64::try_from(original_node_id)
            .ok()
            .filter(|&id| id < self.node_count)
    }

    fn node_count(&self) -> u64 {
        self.node_count
    }
}

/// Mapping backed by the sorted list of original ids.
#[derive(Debug, Clone, Default)]
pub struct ArrayIdMap {
    original_ids: Vec<i64>,
    internal_ids: FxHashMap<i64, u64>,
}

impl ArrayIdMap {
    /// # Arguments
    /// * `original_ids` - Distinct original ids; internal id `i` maps to `original_ids[i]`
    pub fn new(original_ids: Vec<i64>) -> Self {
        let internal_ids = original_ids
            .iter()
            .enumerate()
            .map(|(internal, &original)| (original, internal as u64))
            .collect();
        Self {
            original_ids,
            internal_ids,
        }
    }

    /// Original id of internal node `internal_node_id`.
    pub fn to_original_node_id(&self, internal_node_id: u64) -> Option<i64> {
        self.original_ids.get(internal_node_id as usize).copied()
    }
}

impl PartialIdMap for ArrayIdMap {
    fn to_mapped_node_id(&self, original_node_id: i64) -> Option<u64> {
        self.internal_ids.get(&original_node_id).copied()
    }

    fn node_count(&self) -> u64 {
        self.original_ids.len() as u64
    }
}

/// Collects original ids concurrently, then assigns internal ids in ascending
/// original-id order so the mapping does not depend on insertion order.
#[derive(Debug, Default)]
pub struct IdMapBuilder {
    ids: DashSet<i64>,
}

impl IdMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an original id; repeated ids are ignored.
    pub fn add(&self, original_node_id: i64) {
        self.ids.insert(original_node_id);
    }

    pub fn build(self) -> ArrayIdMap {
        let mut original_ids = self.ids.into_iter().collect::<Vec<_>>();
        original_ids.par_sort_unstable();
        ArrayIdMap::new(original_ids)
    }
}

#[cfg(test)]
mod test_id_map {
    use super::*;

    #[test]
    fn test_direct_id_map_bounds() {
        let id_map = DirectIdMap::new(3);
        assert_eq!(id_map.to_mapped_node_id(2), Some(2));
        assert_eq!(id_map.to_mapped_node_id(3), None);
        assert_eq!(id_map.to_mapped_node_id(-1), None);
    }

    #[test]
    fn test_builder_assigns_ids_in_ascending_order() {
        let builder = IdMapBuilder::new();
        (0..4).into_par_iter().for_each(|_| {
            for id in [1337, -5, 42, 42] {
                builder.add(id);
            }
        });
        let id_map = builder.build();
        assert_eq!(id_map.node_count(), 3);
        assert_eq!(id_map.to_mapped_node_id(-5), Some(0));
        assert_eq!(id_map.to_mapped_node_id(1337), Some(2));
        assert_eq!(id_map.to_original_node_id(1), Some(42));
        assert_eq!(id_map.to_mapped_node_id(7), None);
    }
}
