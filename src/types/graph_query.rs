use std::collections::BTreeMap;

/// A trait that defines query operations over a loaded graph.
///
/// Vertex ids are internal ids in `[0, node_count)`. Out-of-range ids are answered
/// with empty results rather than errors.
pub trait GraphQuery {
    /// Retrieves all neighbors of a given vertex.
    ///
    /// # Parameters
    ///
    /// * `vertex_id` - A reference to the identifier of the vertex whose neighbors are being queried.
    ///
    /// # Returns
    ///
    /// The ascending neighbor ids, empty for unknown vertices.
    fn read_neighbor(&self, vertex_id: &u64) -> Vec<u64>;

    /// Checks if a specific vertex exists in the graph.
    fn has_vertex(&self, vertex_id: &u64) -> bool;

    /// Determines if an edge exists between two specified vertices.
    ///
    /// # Parameters
    ///
    /// * `src_id` - A reference to the identifier of the source vertex.
    /// * `dst_id` - A reference to the identifier of the destination vertex.
    ///
    /// # Returns
    ///
    /// `true` if an edge exists from the source vertex to the destination vertex,
    /// `false` otherwise.
    fn has_edge(&self, src_id: &u64, dst_id: &u64) -> bool;

    /// Retrieves a list of all vertices in the graph.
    fn vertex_list(&self) -> Vec<u64>;

    /// Generates a complete representation of the graph as a map from each vertex
    /// to its neighbors.
    fn all(&self) -> BTreeMap<u64, Vec<u64>>;
}
