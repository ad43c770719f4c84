//! The adjacency compression codec.
//!
//! Targets are sorted, duplicates are folded according to the [`Aggregation`] of the
//! relationship properties, and the delta sequence is bit-packed in blocks (see
//! [`packing`]). Property values stay uncompressed in arrays aligned with the targets.
//! [`varlong`] holds the cheaper codec used while relationships are still arriving.

pub mod aggregation;
pub mod compressor;
pub mod packing;
pub mod varlong;

pub use aggregation::{validate_aggregations, Aggregation};
pub use compressor::{AdjacencyCompressor, AdjacencyCompressorFactory, CompressedAdjacency, PropertyLayout};
