//! Relationship ingestion.
//!
//! Original ids are mapped through a [`PartialIdMap`], buffered per slot in
//! [`LocalRelationshipsBuilder`]s, staged per page in an [`AdjacencyBuffer`] and finally
//! compressed into [`SingleTypeRelationships`].

pub mod adjacency_buffer;
pub mod chunked;
pub mod id_map;
pub mod local_builder;
pub mod relationships;
pub mod relationships_builder;

pub use adjacency_buffer::AdjacencyBuffer;
pub use id_map::{ArrayIdMap, DirectIdMap, IdMapBuilder, PartialIdMap};
pub use local_builder::LocalRelationshipsBuilder;
pub use relationships::{Orientation, RelationshipProperty, SingleTypeRelationships, Topology};
pub use relationships_builder::{PropertyConfig, RelationshipsBuilder, RelationshipsBuilderConfig};
