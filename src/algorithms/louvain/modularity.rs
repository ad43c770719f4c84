use rayon::prelude::*;

use crate::types::CompressedGraph;

/// Weighted degree of every node, computed in parallel.
pub fn weighted_degrees(graph: &CompressedGraph) -> Vec<f64> {
    (0..graph.node_count())
        .into_par_iter()
        .map(|node| graph.weighted_degree(node))
        .collect()
}

/// Modularity of `communities` over a symmetric graph.
///
/// `Q = sum over c of [in_c / M - (tot_c / M)^2]`, where `M` is the sum of all
/// adjacency weights, `in_c` the weight of adjacency entries inside `c` (self loops
/// included) and `tot_c` the summed weighted degree of the members of `c`.
/// Community ids must be node ids of `graph`. A graph without weight has modularity 0.
///
/// # Arguments
/// * `degrees` - Weighted degree of every node, as returned by [`weighted_degrees`]
/// * `total_weight` - `M`, the sum of `degrees`
pub fn modularity(graph: &CompressedGraph, communities: &[u64], degrees: &[f64], total_weight: f64) -> f64 {
    if total_weight <= 0.0 {
        return 0.0;
    }
    let inner_weight: f64 = (0..graph.node_count())
        .into_par_iter()
        .map(|node| {
            let community = communities[node as usize];
            let mut inner = 0.0;
            graph.for_each_relationship(node, |target, weight| {
                if communities[target as usize] == community {
                    inner += weight;
                }
            });
            inner
        })
        .sum();

    let mut community_totals = vec![0.0f64; communities.len()];
    for (node, &community) in communities.iter().enumerate() {
        community_totals[community as usize] += degrees[node];
    }
    let expected: f64 = community_totals
        .iter()
        .map(|total| (total / total_weight).powi(2))
        .sum();
    inner_weight / total_weight - expected
}

#[cfg(test)]
mod test_modularity {
    use crate::loading::Orientation;

    use super::*;

    /// Two triangles joined by one bridge.
    fn barbell() -> CompressedGraph {
        let edges = [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)].map(|(a, b)| (a, b, 1.0));
        CompressedGraph::from_edges(6, &edges, Orientation::Undirected, 2).unwrap()
    }

    #[test]
    fn test_two_triangles() {
        let graph = barbell();
        let degrees = weighted_degrees(&graph);
        let total: f64 = degrees.iter().sum();
        assert_eq!(total, 14.0);
        let q = modularity(&graph, &[0, 0, 0, 3, 3, 3], &degrees, total);
        // in = 12 / 14, tot = 7 / 14 for both halves.
        assert!((q - (12.0 / 14.0 - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_single_community_is_zero() {
        let graph = barbell();
        let degrees = weighted_degrees(&graph);
        let total: f64 = degrees.iter().sum();
        assert!(modularity(&graph, &[0; 6], &degrees, total).abs() < 1e-12);
    }

    #[test]
    fn test_empty_graph() {
        let graph = CompressedGraph::from_edges(3, &[], Orientation::Undirected, 1).unwrap();
        let degrees = weighted_degrees(&graph);
        assert_eq!(modularity(&graph, &[0, 1, 2], &degrees, 0.0), 0.0);
    }
}
