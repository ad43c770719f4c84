use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adjacency::{AdjacencyProperties, PropertyStorage};
use crate::compress::{Aggregation, PropertyLayout};
use crate::concurrency::{worker_pool, SlotPool, TerminationFlag, RUNNING_TRUE};
use crate::config::{DEFAULT_CONCURRENCY, LOCAL_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::loading::adjacency_buffer::AdjacencyBuffer;
use crate::loading::id_map::PartialIdMap;
use crate::loading::local_builder::LocalRelationshipsBuilder;
use crate::loading::relationships::{Orientation, RelationshipProperty, SingleTypeRelationships, Topology};

/// Declaration of one relationship property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyConfig {
    pub key: String,

    /// Overrides the builder-wide aggregation for this property.
    #[serde(default)]
    pub aggregation: Option<Aggregation>,

    /// Value used by [`RelationshipsBuilder::add`] when no value is supplied.
    #[serde(default = "default_property_value")]
    pub default_value: f64,
}

fn default_property_value() -> f64 {
    1.0
}

impl PropertyConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            aggregation: None,
            default_value: default_property_value(),
        }
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_default_value(mut self, default_value: f64) -> Self {
        self.default_value = default_value;
        self
    }
}

/// Settings of a [`RelationshipsBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipsBuilderConfig {
    pub orientation: Orientation,

    /// Aggregation of parallel relationships, unless a property overrides it.
    pub aggregation: Aggregation,

    pub properties: Vec<PropertyConfig>,

    /// Also build the topology with every relationship reversed.
    pub index_inverse: bool,

    /// Drop relationships with unmapped endpoints instead of failing.
    pub skip_dangling: bool,

    pub concurrency: usize,

    /// Relationships buffered per slot before a flush.
    pub buffer_size: usize,
}

impl Default for RelationshipsBuilderConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Natural,
            aggregation: Aggregation::None,
            properties: Vec::new(),
            index_inverse: false,
            skip_dangling: false,
            concurrency: DEFAULT_CONCURRENCY,
            buffer_size: LOCAL_BUFFER_SIZE,
        }
    }
}

impl RelationshipsBuilderConfig {
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_property(mut self, property: PropertyConfig) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_index_inverse(mut self, index_inverse: bool) -> Self {
        self.index_inverse = index_inverse;
        self
    }

    pub fn with_skip_dangling(mut self, skip_dangling: bool) -> Self {
        self.skip_dangling = skip_dangling;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Checks the settings and derives the property layout.
    fn layout(&self) -> Result<PropertyLayout> {
        if self.concurrency < 1 {
            return Err(Error::invalid_config("concurrency", "must be at least 1"));
        }
        if self.buffer_size < 1 {
            return Err(Error::invalid_config("buffer_size", "must be at least 1"));
        }
        if self.index_inverse && self.orientation == Orientation::Undirected {
            return Err(Error::invalid_config(
                "index_inverse",
                "undirected relationships cannot be inverse indexed",
            ));
        }
        let keys = self
            .properties
            .iter()
            .map(|property| property.key.clone())
            .collect::<Vec<_>>();
        for (position, key) in keys.iter().enumerate() {
            if keys[..position].contains(key) {
                return Err(Error::invalid_config(
                    "properties",
                    format!("property '{key}' is declared twice"),
                ));
            }
        }
        let aggregations = self
            .properties
            .iter()
            .map(|property| property.aggregation.unwrap_or(self.aggregation))
            .collect();
        PropertyLayout::new(keys, aggregations, self.aggregation)
    }
}

struct LocalSlot {
    forward: LocalRelationshipsBuilder,
    inverse: Option<LocalRelationshipsBuilder>,
}

/// Concurrent builder for one relationship type.
///
/// Any number of threads may call the `add` methods; each call leases one of
/// `concurrency` local buffers. [`RelationshipsBuilder::build`] closes the builder,
/// waits for in-flight additions and compresses everything in parallel.
pub struct RelationshipsBuilder {
    id_map: Arc<dyn PartialIdMap>,
    config: RelationshipsBuilderConfig,
    layout: PropertyLayout,
    defaults: Vec<f64>,
    forward: AdjacencyBuffer,
    inverse: Option<AdjacencyBuffer>,
    slots: SlotPool<LocalSlot>,
    built: AtomicBool,
    dropped: AtomicU64,
}

impl RelationshipsBuilder {
    /// # Returns
    /// * `Err(Error::InvalidConfiguration)` - Invalid concurrency, buffer size or inverse setting
    /// * `Err(Error::AggregationMismatch)` - `NONE` mixed with folding property aggregations
    pub fn new(id_map: Arc<dyn PartialIdMap>, config: RelationshipsBuilderConfig) -> Result<Self> {
        let layout = config.layout()?;
        let node_count = id_map.node_count();
        let property_count = layout.property_count();
        let slots = (0..config.concurrency)
            .map(|_| LocalSlot {
                forward: LocalRelationshipsBuilder::new(config.buffer_size, property_count),
                inverse: config
                    .index_inverse
                    .then(|| LocalRelationshipsBuilder::new(config.buffer_size, property_count)),
            })
            .collect();
        Ok(Self {
            defaults: config.properties.iter().map(|p| p.default_value).collect(),
            forward: AdjacencyBuffer::new(node_count, property_count),
            inverse: config
                .index_inverse
                .then(|| AdjacencyBuffer::new(node_count, property_count)),
            slots: SlotPool::new(slots),
            built: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            id_map,
            config,
            layout,
        })
    }

    pub fn node_count(&self) -> u64 {
        self.forward.node_count()
    }

    /// Relationships skipped because an endpoint was not mapped.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    /// Adds a relationship between original ids, using the default property values.
    pub fn add(&self, source: i64, target: i64) -> Result<()> {
        if let Some((source, target)) = self.map_ids(source, target)? {
            self.insert(source, target, &self.defaults)?;
        }
        Ok(())
    }

    /// Adds a relationship carrying the value of the only declared property.
    pub fn add_with_property(&self, source: i64, target: i64, value: f64) -> Result<()> {
        self.add_with_properties(source, target, &[value])
    }

    /// Adds a relationship carrying one value per declared property.
    ///
    /// # Returns
    /// * `Err(Error::DimensionMismatch)` - `values` does not match the declared properties
    /// * `Err(Error::InvalidPropertyValue)` - A value is NaN or infinite
    /// * `Err(Error::UnmappedNodeId)` - An endpoint is unmapped and dangling relationships are not skipped
    /// * `Err(Error::BuilderClosed)` - The builder has been built already
    pub fn add_with_properties(&self, source: i64, target: i64, values: &[f64]) -> Result<()> {
        self.validate_values(values)?;
        if let Some((source, target)) = self.map_ids(source, target)? {
            self.insert(source, target, values)?;
        }
        Ok(())
    }

    /// Adds a relationship between internal ids, bypassing the id map.
    pub fn add_from_internal(&self, source: u64, target: u64, values: &[f64]) -> Result<()> {
        let node_count = self.node_count();
        for node in [source, target] {
            if node >= node_count {
                return Err(Error::NodeOutOfRange {
                    node_id: node,
                    node_count,
                });
            }
        }
        self.validate_values(values)?;
        self.insert(source, target, values)
    }

    fn validate_values(&self, values: &[f64]) -> Result<()> {
        let keys = self.layout.keys();
        if values.len() != keys.len() {
            let key = keys
                .get(values.len())
                .or(keys.last())
                .cloned()
                .unwrap_or_default();
            return Err(Error::DimensionMismatch {
                key,
                expected: keys.len(),
                actual: values.len(),
            });
        }
        for (key, &value) in keys.iter().zip(values) {
            if !value.is_finite() {
                return Err(Error::InvalidPropertyValue {
                    key: key.clone(),
                    value,
                });
            }
        }
        Ok(())
    }

    fn map_ids(&self, source: i64, target: i64) -> Result<Option<(u64, u64)>> {
        let mapped_source = self.id_map.to_mapped_node_id(source);
        let mapped_target = self.id_map.to_mapped_node_id(target);
        match (mapped_source, mapped_target) {
            (Some(source), Some(target)) => Ok(Some((source, target))),
            _ if self.config.skip_dangling => {
                self.dropped.fetch_add(1, Ordering::AcqRel);
                Ok(None)
            }
            _ => {
                let missing = [(source, mapped_source), (target, mapped_target)]
                    .into_iter()
                    .filter(|(_, mapped)| mapped.is_none())
                    .map(|(original, _)| original)
                    .collect();
                Err(Error::UnmappedNodeId(missing))
            }
        }
    }

    fn insert(&self, source: u64, target: u64, values: &[f64]) -> Result<()> {
        if self.built.load(Ordering::Acquire) {
            return Err(Error::BuilderClosed);
        }
        let mut guard = self.slots.acquire()?;
        let slot = &mut *guard;
        let forward = &self.forward;
        match self.config.orientation {
            Orientation::Natural => slot.forward.add(source, target, values, forward),
            Orientation::Reverse => slot.forward.add(target, source, values, forward),
            Orientation::Undirected => {
                slot.forward.add(source, target, values, forward);
                slot.forward.add(target, source, values, forward);
            }
        }
        if let (Some(local), Some(buffer)) = (slot.inverse.as_mut(), self.inverse.as_ref()) {
            match self.config.orientation {
                Orientation::Reverse => local.add(source, target, values, buffer),
                _ => local.add(target, source, values, buffer),
            }
        }
        Ok(())
    }

    /// Builds with a flag that never terminates. See [`RelationshipsBuilder::build_with`].
    pub fn build(&self) -> Result<SingleTypeRelationships> {
        self.build_with(&RUNNING_TRUE)
    }

    /// Builds on a fresh pool of the configured concurrency. See [`RelationshipsBuilder::build_in`].
    pub fn build_with(&self, termination: &dyn TerminationFlag) -> Result<SingleTypeRelationships> {
        let pool = worker_pool(self.config.concurrency)?;
        self.build_in(&pool, termination)
    }

    /// Closes the builder and compresses all buffered relationships on `pool`.
    ///
    /// # Returns
    /// * `Err(Error::AlreadyBuilt)` - On every call after the first
    /// * `Err(Error::Terminated)` - `termination` was lowered during compression
    pub fn build_in(&self, pool: &ThreadPool, termination: &dyn TerminationFlag) -> Result<SingleTypeRelationships> {
        if self.built.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyBuilt);
        }

        // Step 1. Drain every slot into the page buffers.
        self.slots.close(|slot| {
            slot.forward.flush(&self.forward);
            if let (Some(local), Some(buffer)) = (slot.inverse.as_mut(), self.inverse.as_ref()) {
                local.flush(buffer);
            }
        })?;
        let dropped = self.dropped_count();
        if dropped > 0 {
            warn!(dropped, "skipped relationships with unmapped endpoints");
        }

        // Step 2. Compress forward and inverse adjacency in parallel.
        let concurrency = self.config.concurrency;
        let is_multigraph = !self.layout.folds();
        let forward = self
            .forward
            .compress(self.layout.clone(), pool, concurrency, termination)?;
        let topology = Topology::new(forward.list, self.config.orientation, is_multigraph);
        let properties = self.properties_of(forward.properties);

        let (inverse_topology, inverse_properties) = match &self.inverse {
            Some(buffer) => {
                let inverse = buffer.compress(self.layout.clone(), pool, concurrency, termination)?;
                (
                    Some(Topology::new(inverse.list, self.config.orientation, is_multigraph)),
                    self.properties_of(inverse.properties),
                )
            }
            None => (None, Vec::new()),
        };

        info!(
            nodes = topology.node_count(),
            relationships = topology.relationship_count(),
            properties = properties.len(),
            inverse = inverse_topology.is_some(),
            "relationships built"
        );
        Ok(SingleTypeRelationships {
            topology,
            properties,
            inverse_topology,
            inverse_properties,
        })
    }

    fn properties_of(&self, storage: Option<Arc<PropertyStorage>>) -> Vec<RelationshipProperty> {
        let Some(storage) = storage else {
            return Vec::new();
        };
        self.config
            .properties
            .iter()
            .zip(self.layout.aggregations())
            .enumerate()
            .map(|(index, (property, &aggregation))| {
                RelationshipProperty::new(
                    property.key.clone(),
                    aggregation,
                    property.default_value,
                    AdjacencyProperties::new(Arc::clone(&storage), index),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod test_relationships_builder {
    use rayon::prelude::*;

    use crate::concurrency::TerminationSignal;
    use crate::loading::id_map::{DirectIdMap, IdMapBuilder};

    use super::*;

    fn direct(node_count: u64) -> Arc<dyn PartialIdMap> {
        Arc::new(DirectIdMap::new(node_count))
    }

    fn neighbours(relationships: &SingleTypeRelationships, node: u64) -> Vec<u64> {
        relationships.topology.cursor(node).collect()
    }

    #[test]
    fn test_natural_topology() {
        let builder = RelationshipsBuilder::new(direct(4), RelationshipsBuilderConfig::default()).unwrap();
        builder.add(0, 1).unwrap();
        builder.add(0, 3).unwrap();
        builder.add(2, 0).unwrap();
        let relationships = builder.build().unwrap();
        assert_eq!(neighbours(&relationships, 0), vec![1, 3]);
        assert_eq!(neighbours(&relationships, 2), vec![0]);
        assert_eq!(relationships.topology.relationship_count(), 3);
        assert!(relationships.inverse_topology.is_none());
    }

    #[test]
    fn test_undirected_and_reverse() {
        let config = RelationshipsBuilderConfig::default().with_orientation(Orientation::Undirected);
        let builder = RelationshipsBuilder::new(direct(3), config).unwrap();
        builder.add(0, 2).unwrap();
        let relationships = builder.build().unwrap();
        assert_eq!(neighbours(&relationships, 0), vec![2]);
        assert_eq!(neighbours(&relationships, 2), vec![0]);

        let config = RelationshipsBuilderConfig::default().with_orientation(Orientation::Reverse);
        let builder = RelationshipsBuilder::new(direct(3), config).unwrap();
        builder.add(0, 2).unwrap();
        let relationships = builder.build().unwrap();
        assert!(neighbours(&relationships, 0).is_empty());
        assert_eq!(neighbours(&relationships, 2), vec![0]);
    }

    #[test]
    fn test_inverse_index_with_properties() {
        let config = RelationshipsBuilderConfig::default()
            .with_property(PropertyConfig::new("weight"))
            .with_index_inverse(true);
        let builder = RelationshipsBuilder::new(direct(3), config).unwrap();
        builder.add_with_property(0, 1, 0.5).unwrap();
        builder.add_with_property(2, 1, 2.5).unwrap();
        let relationships = builder.build().unwrap();

        let inverse = relationships.inverse_topology.as_ref().unwrap();
        assert_eq!(inverse.cursor(1).collect::<Vec<_>>(), vec![0, 2]);
        let weights = relationships.inverse_property("weight").unwrap();
        assert_eq!(weights.cursor(1).collect::<Vec<_>>(), vec![0.5, 2.5]);
        assert!(matches!(
            relationships.property("missing"),
            Err(Error::PropertyNotFound(_))
        ));
    }

    /// Parallel relationships are summed into one with SUM aggregation.
    #[test]
    fn test_sum_aggregation() {
        let config = RelationshipsBuilderConfig::default()
            .with_aggregation(Aggregation::Sum)
            .with_property(PropertyConfig::new("weight"))
            .with_concurrency(4)
            .with_buffer_size(3);
        let builder = RelationshipsBuilder::new(direct(2), config).unwrap();
        (0..1000).into_par_iter().for_each(|_| {
            builder.add_with_property(0, 1, 0.25).unwrap();
        });
        let relationships = builder.build().unwrap();
        assert_eq!(neighbours(&relationships, 0), vec![1]);
        assert!(!relationships.topology.is_multigraph());
        let weight = relationships.property("weight").unwrap();
        assert_eq!(weight.cursor(0).collect::<Vec<_>>(), vec![250.0]);
    }

    #[test]
    fn test_unmapped_ids_reported() {
        let ids = IdMapBuilder::new();
        ids.add(10);
        ids.add(20);
        let builder = RelationshipsBuilder::new(Arc::new(ids.build()), RelationshipsBuilderConfig::default()).unwrap();
        builder.add(10, 20).unwrap();
        let error = builder.add(42, 1337).unwrap_err();
        assert_eq!(
            error.to_string(),
            "The following node ids are not present in the node id space: 42, 1337"
        );
        let error = builder.add(10, 7).unwrap_err();
        assert!(matches!(error, Error::UnmappedNodeId(ids) if ids == vec![7]));
    }

    #[test]
    fn test_skip_dangling_counts_dropped() {
        let config = RelationshipsBuilderConfig::default().with_skip_dangling(true);
        let builder = RelationshipsBuilder::new(direct(2), config).unwrap();
        builder.add(0, 1).unwrap();
        builder.add(0, 5).unwrap();
        assert_eq!(builder.dropped_count(), 1);
        assert_eq!(builder.build().unwrap().topology.relationship_count(), 1);
    }

    #[test]
    fn test_property_validation() {
        let config = RelationshipsBuilderConfig::default()
            .with_property(PropertyConfig::new("a"))
            .with_property(PropertyConfig::new("b"));
        let builder = RelationshipsBuilder::new(direct(2), config).unwrap();
        let error = builder.add_with_properties(0, 1, &[1.0]).unwrap_err();
        assert!(matches!(error, Error::DimensionMismatch { ref key, .. } if key == "b"));
        let error = builder.add_with_properties(0, 1, &[1.0, f64::NAN]).unwrap_err();
        assert!(matches!(error, Error::InvalidPropertyValue { ref key, .. } if key == "b"));
        assert!(matches!(
            builder.add_from_internal(0, 9, &[1.0, 1.0]),
            Err(Error::NodeOutOfRange { node_id: 9, .. })
        ));
    }

    #[test]
    fn test_build_twice_and_add_after_build() {
        let builder = RelationshipsBuilder::new(direct(2), RelationshipsBuilderConfig::default()).unwrap();
        builder.build().unwrap();
        assert!(matches!(builder.build(), Err(Error::AlreadyBuilt)));
        assert!(matches!(builder.add(0, 1), Err(Error::BuilderClosed)));
    }

    #[test]
    fn test_invalid_configurations() {
        let mixed = RelationshipsBuilderConfig::default()
            .with_property(PropertyConfig::new("a").with_aggregation(Aggregation::None))
            .with_property(PropertyConfig::new("b").with_aggregation(Aggregation::Sum));
        assert!(matches!(
            RelationshipsBuilder::new(direct(1), mixed),
            Err(Error::AggregationMismatch(_))
        ));
        let inverse_undirected = RelationshipsBuilderConfig::default()
            .with_orientation(Orientation::Undirected)
            .with_index_inverse(true);
        assert!(RelationshipsBuilder::new(direct(1), inverse_undirected).is_err());
        let zero = RelationshipsBuilderConfig::default().with_concurrency(0);
        assert!(RelationshipsBuilder::new(direct(1), zero).is_err());
    }

    #[test]
    fn test_terminated_build() {
        let builder = RelationshipsBuilder::new(direct(2), RelationshipsBuilderConfig::default()).unwrap();
        builder.add(0, 1).unwrap();
        let error = builder.build_with(&TerminationSignal::terminated()).unwrap_err();
        assert!(error.is_terminated());
    }

    /// Several builders compress on one caller-owned pool.
    #[test]
    fn test_build_in_shared_pool() {
        let pool = worker_pool(2).unwrap();
        for round in 0..3u64 {
            let config = RelationshipsBuilderConfig::default()
                .with_aggregation(Aggregation::Sum)
                .with_property(PropertyConfig::new("w"))
                .with_concurrency(2);
            let builder = RelationshipsBuilder::new(direct(3), config).unwrap();
            builder.add_from_internal(0, 2, &[1.0]).unwrap();
            builder.add_from_internal(0, 2, &[round as f64]).unwrap();
            builder.add_from_internal(2, 1, &[5.0]).unwrap();
            let relationships = builder.build_in(&pool, &RUNNING_TRUE).unwrap();
            assert_eq!(neighbours(&relationships, 0), vec![2]);
            assert_eq!(neighbours(&relationships, 2), vec![1]);
            let weights = relationships.property("w").unwrap().cursor(0).collect::<Vec<_>>();
            assert_eq!(weights, vec![1.0 + round as f64]);
        }
    }

    #[test]
    fn test_config_from_yaml() {
        let config: RelationshipsBuilderConfig = serde_yaml::from_str(
            "orientation: UNDIRECTED\naggregation: SUM\nproperties:\n  - key: weight\n",
        )
        .unwrap();
        assert_eq!(config.orientation, Orientation::Undirected);
        assert_eq!(config.properties[0].default_value, 1.0);
    }
}
