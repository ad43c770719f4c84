use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::adjacency::{AdjacencyList, AdjacencyListBuilder, Allocator, PropertyStorage};
use crate::compress::aggregation::{validate_aggregations, Aggregation};
use crate::compress::packing::pack;
use crate::error::{Error, Result};
use crate::paged::{HugeArray, HugeAtomicU64Array};

/// Names and aggregation policies of the relationship properties.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLayout {
    keys: Vec<String>,
    aggregations: Vec<Aggregation>,
    topology_aggregation: Aggregation,
}

impl PropertyLayout {
    /// # Arguments
    /// * `keys` - Property keys, in the order values are supplied
    /// * `aggregations` - One policy per key
    /// * `topology_aggregation` - Policy used when there are no properties
    ///
    /// # Returns
    /// * `Err(Error::AggregationMismatch)` - When `NONE` is mixed with folding policies
    pub fn new(
        keys: Vec<String>,
        aggregations: Vec<Aggregation>,
        topology_aggregation: Aggregation,
    ) -> Result<Self> {
        if keys.len() != aggregations.len() {
            return Err(Error::invalid_config(
                "aggregations",
                format!("expected {} aggregations, got {}", keys.len(), aggregations.len()),
            ));
        }
        validate_aggregations(&keys, &aggregations)?;
        Ok(Self {
            keys,
            aggregations,
            topology_aggregation,
        })
    }

    /// A layout without properties.
    pub fn topology_only(aggregation: Aggregation) -> Self {
        Self {
            keys: Vec::new(),
            aggregations: Vec::new(),
            topology_aggregation: aggregation,
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn aggregations(&self) -> &[Aggregation] {
        &self.aggregations
    }

    pub fn property_count(&self) -> usize {
        self.keys.len()
    }

    /// Whether parallel relationships are folded into one.
    pub fn folds(&self) -> bool {
        match self.aggregations.first() {
            Some(aggregation) => aggregation.folds(),
            None => self.topology_aggregation.folds(),
        }
    }
}

/// Output of a finished compression pass.
#[derive(Debug)]
pub struct CompressedAdjacency {
    pub list: AdjacencyList,
    pub properties: Option<Arc<PropertyStorage>>,
}

/// Shared state of one compression pass; hands out per-worker compressors.
pub struct AdjacencyCompressorFactory {
    node_count: u64,
    layout: PropertyLayout,
    targets: AdjacencyListBuilder<u8>,
    properties: AdjacencyListBuilder<i64>,
    degrees: HugeAtomicU64Array,
    offsets: HugeAtomicU64Array,
    property_offsets: HugeAtomicU64Array,
    relationship_count: AtomicU64,
}

impl AdjacencyCompressorFactory {
    pub fn new(node_count: u64, layout: PropertyLayout) -> Self {
        Self {
            node_count,
            layout,
            targets: AdjacencyListBuilder::for_targets(),
            properties: AdjacencyListBuilder::for_properties(),
            degrees: HugeAtomicU64Array::new(node_count),
            offsets: HugeAtomicU64Array::new(node_count),
            property_offsets: HugeAtomicU64Array::new(node_count),
            relationship_count: AtomicU64::new(0),
        }
    }

    pub fn layout(&self) -> &PropertyLayout {
        &self.layout
    }

    /// A compressor owning its own target and property pages.
    pub fn compressor(&self) -> AdjacencyCompressor<'_> {
        AdjacencyCompressor {
            factory: self,
            targets: self.targets.allocator(),
            properties: self.properties.allocator(),
            order: Vec::new(),
            deltas: Vec::new(),
            packed: Vec::new(),
            sorted_properties: Vec::new(),
        }
    }

    /// Freezes degrees, addresses and pages into immutable structures.
    pub fn build(self) -> CompressedAdjacency {
        let degrees = Arc::new(to_huge_array(&self.degrees));
        let offsets = to_huge_array(&self.offsets);
        let relationship_count = self.relationship_count.load(Ordering::Acquire);
        let properties = (self.layout.property_count() > 0).then(|| {
            Arc::new(PropertyStorage::new(
                Arc::clone(&degrees),
                to_huge_array(&self.property_offsets),
                self.properties.build(),
                self.layout.property_count(),
            ))
        });
        let list = AdjacencyList::new(degrees, offsets, self.targets.build(), relationship_count);
        CompressedAdjacency { list, properties }
    }
}

fn to_huge_array(values: &HugeAtomicU64Array) -> HugeArray<u64> {
    HugeArray::from_fn(values.len(), |index| values.get(index))
}

/// Per-worker compressor; reuses its scratch buffers between nodes.
pub struct AdjacencyCompressor<'a> {
    factory: &'a AdjacencyCompressorFactory,
    targets: Allocator<'a, u8>,
    properties: Allocator<'a, i64>,
    order: Vec<usize>,
    deltas: Vec<u64>,
    packed: Vec<u8>,
    sorted_properties: Vec<i64>,
}

impl AdjacencyCompressor<'_> {
    /// Compresses the raw relationships of `node`.
    ///
    /// # Arguments
    /// * `node` - Internal id of the source node
    /// * `targets` - Raw targets in any order; sorted and folded in place
    /// * `properties` - One value array per declared property, aligned with `targets`,
    ///   values as `f64` bit patterns
    /// * `mapper` - Optional function applied to every target before sorting
    ///
    /// # Returns
    /// * `Ok(u64)` - The final degree after aggregation
    /// * `Err(Error::DimensionMismatch)` - A property array is not aligned with the targets
    pub fn compress(
        &mut self,
        node: u64,
        targets: &mut Vec<u64>,
        properties: &mut [Vec<i64>],
        mapper: Option<&dyn Fn(u64) -> u64>,
    ) -> Result<u64> {
        let factory = self.factory;
        let layout = &factory.layout;
        if node >= factory.node_count {
            return Err(Error::NodeOutOfRange {
                node_id: node,
                node_count: factory.node_count,
            });
        }
        if properties.len() != layout.property_count() {
            let key = layout
                .keys
                .get(properties.len())
                .or(layout.keys.last())
                .cloned()
                .unwrap_or_default();
            return Err(Error::DimensionMismatch {
                key,
                expected: layout.property_count(),
                actual: properties.len(),
            });
        }
        for (key, values) in layout.keys.iter().zip(properties.iter()) {
            if values.len() != targets.len() {
                return Err(Error::DimensionMismatch {
                    key: key.clone(),
                    expected: targets.len(),
                    actual: values.len(),
                });
            }
        }

        // Step 1. Empty lists take no storage.
        if targets.is_empty() {
            factory.degrees.set(node, 0);
            return Ok(0);
        }

        // Step 2. Map, sort and fold duplicates.
        if let Some(mapper) = mapper {
            targets.iter_mut().for_each(|target| *target = mapper(*target));
        }
        if properties.is_empty() {
            targets.sort_unstable();
            if layout.folds() {
                targets.dedup();
            }
        } else {
            self.sort_with_properties(targets, properties);
            if layout.folds() {
                fold_duplicates(targets, properties, &layout.aggregations);
            }
        }
        let degree = targets.len();

        // Step 3. Delta encode and bit-pack the targets.
        self.deltas.clear();
        let mut previous = 0u64;
        for &target in targets.iter() {
            self.deltas.push(target - previous);
            previous = target;
        }
        self.packed.clear();
        pack(&self.deltas, &mut self.packed);
        let (address, slice) = self.targets.allocate(self.packed.len())?;
        slice.copy_from_slice(&self.packed);
        factory.offsets.set(node, address);
        factory.degrees.set(node, degree as u64);
        factory
            .relationship_count
            .fetch_add(degree as u64, Ordering::AcqRel);

        // Step 4. Store the property values property-major.
        if !properties.is_empty() {
            let (address, slice) = self.properties.allocate(degree * properties.len())?;
            for (chunk, values) in slice.chunks_mut(degree).zip(properties.iter()) {
                chunk.copy_from_slice(values);
            }
            factory.property_offsets.set(node, address);
        }
        Ok(degree as u64)
    }

    fn sort_with_properties(&mut self, targets: &mut Vec<u64>, properties: &mut [Vec<i64>]) {
        self.order.clear();
        self.order.extend(0..targets.len());
        // Stable, so folding sees duplicates in insertion order.
        self.order.sort_by_key(|&index| targets[index]);

        for values in properties.iter_mut() {
            self.sorted_properties.clear();
            self.sorted_properties
                .extend(self.order.iter().map(|&index| values[index]));
            values.copy_from_slice(&self.sorted_properties);
        }
        self.deltas.clear();
        self.deltas.extend(self.order.iter().map(|&index| targets[index]));
        targets.copy_from_slice(&self.deltas);
    }
}

fn fold_duplicates(targets: &mut Vec<u64>, properties: &mut [Vec<i64>], aggregations: &[Aggregation]) {
    let mut write = 0usize;
    for read in 0..targets.len() {
        if write > 0 && targets[read] == targets[write - 1] {
            for (values, aggregation) in properties.iter_mut().zip(aggregations) {
                let merged = aggregation.merge(
                    f64::from_bits(values[write - 1] as u64),
                    f64::from_bits(values[read] as u64),
                );
                values[write - 1] = merged.to_bits() as i64;
            }
        } else {
            targets[write] = targets[read];
            for values in properties.iter_mut() {
                values[write] = values[read];
            }
            write += 1;
        }
    }
    targets.truncate(write);
    for values in properties.iter_mut() {
        values.truncate(write);
    }
}

#[cfg(test)]
mod test_compressor {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use crate::adjacency::AdjacencyProperties;

    use super::*;

    fn bits(values: &[f64]) -> Vec<i64> {
        values.iter().map(|value| value.to_bits() as i64).collect()
    }

    fn weighted(aggregation: Aggregation) -> PropertyLayout {
        PropertyLayout::new(vec!["weight".to_string()], vec![aggregation], aggregation).unwrap()
    }

    #[test]
    fn test_sorts_and_keeps_duplicates() {
        let factory = AdjacencyCompressorFactory::new(2, PropertyLayout::topology_only(Aggregation::None));
        let degree = factory
            .compressor()
            .compress(0, &mut vec![9, 3, 3, 1], &mut [], None)
            .unwrap();
        assert_eq!(degree, 4);
        let compressed = factory.build();
        assert_eq!(compressed.list.cursor(0).collect::<Vec<_>>(), vec![1, 3, 3, 9]);
        assert_eq!(compressed.list.degree(1), 0);
        assert_eq!(compressed.list.relationship_count(), 4);
        assert!(compressed.properties.is_none());
    }

    /// Duplicate targets are folded and their property values summed.
    #[test]
    fn test_sum_aggregation_folds_properties() {
        let factory = AdjacencyCompressorFactory::new(1, weighted(Aggregation::Sum));
        let mut targets = vec![5, 2, 5, 2, 7];
        let mut properties = vec![bits(&[1.0, 2.0, 3.0, 4.0, 5.0])];
        let degree = factory
            .compressor()
            .compress(0, &mut targets, &mut properties, None)
            .unwrap();
        assert_eq!(degree, 3);
        let compressed = factory.build();
        let weights = AdjacencyProperties::new(compressed.properties.unwrap(), 0);
        assert_eq!(compressed.list.cursor(0).collect::<Vec<_>>(), vec![2, 5, 7]);
        assert_eq!(weights.cursor(0).collect::<Vec<_>>(), vec![6.0, 4.0, 5.0]);
    }

    #[test]
    fn test_single_keeps_first_value() {
        let factory = AdjacencyCompressorFactory::new(1, weighted(Aggregation::Single));
        let mut properties = vec![bits(&[1.0, 2.0])];
        factory
            .compressor()
            .compress(0, &mut vec![4, 4], &mut properties, None)
            .unwrap();
        let compressed = factory.build();
        let weights = AdjacencyProperties::new(compressed.properties.unwrap(), 0);
        assert_eq!(weights.cursor(0).collect::<Vec<_>>(), vec![1.0]);
    }

    #[test]
    fn test_mapper_applied_before_sorting() {
        let factory = AdjacencyCompressorFactory::new(1, PropertyLayout::topology_only(Aggregation::None));
        let mapper: &dyn Fn(u64) -> u64 = &|target| 100 - target;
        factory
            .compressor()
            .compress(0, &mut vec![1, 2, 3], &mut [], Some(mapper))
            .unwrap();
        assert_eq!(factory.build().list.cursor(0).collect::<Vec<_>>(), vec![97, 98, 99]);
    }

    #[test]
    fn test_empty_and_single_lists() {
        let factory = AdjacencyCompressorFactory::new(2, PropertyLayout::topology_only(Aggregation::None));
        {
            let mut compressor = factory.compressor();
            assert_eq!(compressor.compress(0, &mut vec![], &mut [], None).unwrap(), 0);
            assert_eq!(compressor.compress(1, &mut vec![42], &mut [], None).unwrap(), 1);
        }
        let compressed = factory.build();
        assert_eq!(compressed.list.cursor(0).count(), 0);
        assert_eq!(compressed.list.cursor(1).collect::<Vec<_>>(), vec![42]);
    }

    #[test]
    fn test_dimension_mismatch_names_key() {
        let factory = AdjacencyCompressorFactory::new(1, weighted(Aggregation::None));
        let mut properties = vec![bits(&[1.0])];
        let error = factory
            .compressor()
            .compress(0, &mut vec![1, 2], &mut properties, None)
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("same number of dimensions"));
        assert!(message.contains("'weight'"));
    }

    #[test]
    fn test_mixed_none_layout_rejected() {
        let error = PropertyLayout::new(
            vec!["a".to_string(), "b".to_string()],
            vec![Aggregation::None, Aggregation::Max],
            Aggregation::None,
        )
        .unwrap_err();
        assert!(error.is_configuration());
    }

    proptest! {
        /// The cursor reproduces the sorted, aggregated input.
        #[test]
        fn prop_round_trip_with_max(edges in prop::collection::vec((0u64..5_000, -100i32..100), 0..400)) {
            let factory = AdjacencyCompressorFactory::new(1, weighted(Aggregation::Max));
            let mut targets = edges.iter().map(|(target, _)| *target).collect::<Vec<_>>();
            let mut properties: Vec<Vec<i64>> = vec![edges.iter().map(|(_, value)| (*value as f64).to_bits() as i64).collect()];
            factory.compressor().compress(0, &mut targets, &mut properties, None).unwrap();

            let mut expected = BTreeMap::<u64, f64>::new();
            for (target, value) in &edges {
                let entry = expected.entry(*target).or_insert(f64::MIN);
                *entry = entry.max(*value as f64);
            }
            let compressed = factory.build();
            let weights = AdjacencyProperties::new(compressed.properties.unwrap(), 0);
            let actual = compressed.list.cursor(0).zip(weights.cursor(0)).collect::<Vec<_>>();
            prop_assert_eq!(actual, expected.into_iter().collect::<Vec<_>>());
        }
    }
}
