//! Immutable compressed adjacency lists and the paged builder producing them.

pub mod builder;
pub mod list;

pub use builder::{decode_address, encode_address, AdjacencyListBuilder, Allocator};
pub use list::cursor::{AdjacencyCursor, PropertyCursor};
pub use list::{AdjacencyList, AdjacencyProperties, PropertyStorage};
