use serde::{Deserialize, Serialize};

use crate::adjacency::{AdjacencyCursor, AdjacencyList, AdjacencyProperties, PropertyCursor};
use crate::compress::Aggregation;
use crate::error::{Error, Result};

/// Direction in which relationships are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    /// As given, source to target.
    #[default]
    Natural,
    /// Target to source.
    Reverse,
    /// Both directions.
    Undirected,
}

/// An immutable adjacency list with its orientation.
#[derive(Debug)]
pub struct Topology {
    adjacency: AdjacencyList,
    orientation: Orientation,
    is_multigraph: bool,
}

impl Topology {
    pub fn new(adjacency: AdjacencyList, orientation: Orientation, is_multigraph: bool) -> Self {
        Self {
            adjacency,
            orientation,
            is_multigraph,
        }
    }

    pub fn adjacency(&self) -> &AdjacencyList {
        &self.adjacency
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Whether parallel relationships were kept.
    pub fn is_multigraph(&self) -> bool {
        self.is_multigraph
    }

    pub fn node_count(&self) -> u64 {
        self.adjacency.node_count()
    }

    pub fn relationship_count(&self) -> u64 {
        self.adjacency.relationship_count()
    }

    pub fn degree(&self, node: u64) -> u64 {
        self.adjacency.degree(node)
    }

    pub fn cursor(&self, node: u64) -> AdjacencyCursor<'_> {
        self.adjacency.cursor(node)
    }
}

/// One relationship property with the settings it was built with.
#[derive(Debug, Clone)]
pub struct RelationshipProperty {
    key: String,
    aggregation: Aggregation,
    default_value: f64,
    values: AdjacencyProperties,
}

impl RelationshipProperty {
    pub fn new(key: String, aggregation: Aggregation, default_value: f64, values: AdjacencyProperties) -> Self {
        Self {
            key,
            aggregation,
            default_value,
            values,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Values of `node`, aligned with the topology cursor of the same node.
    pub fn cursor(&self, node: u64) -> PropertyCursor<'_> {
        self.values.cursor(node)
    }
}

/// Everything built for one relationship type.
#[derive(Debug)]
pub struct SingleTypeRelationships {
    pub topology: Topology,
    pub properties: Vec<RelationshipProperty>,
    pub inverse_topology: Option<Topology>,
    pub inverse_properties: Vec<RelationshipProperty>,
}

impl SingleTypeRelationships {
    /// Looks up a property by key.
    ///
    /// # Returns
    /// * `Err(Error::PropertyNotFound)` - No property with that key was declared
    pub fn property(&self, key: &str) -> Result<&RelationshipProperty> {
        self.properties
            .iter()
            .find(|property| property.key == key)
            .ok_or_else(|| Error::PropertyNotFound(key.to_string()))
    }

    /// Looks up an inverse-indexed property by key.
    pub fn inverse_property(&self, key: &str) -> Result<&RelationshipProperty> {
        self.inverse_properties
            .iter()
            .find(|property| property.key == key)
            .ok_or_else(|| Error::PropertyNotFound(key.to_string()))
    }
}
