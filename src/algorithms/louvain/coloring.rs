use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::types::CompressedGraph;

/// Assigns colors so that no two adjacent nodes share one.
///
/// Nodes of one color can then decide their moves concurrently without reading each
/// other's decisions. Self loops are ignored.
pub trait ColoringStrategy: Send + Sync + Debug {
    /// Color of every node; colors are dense in `0..color_count`.
    fn color(&self, graph: &CompressedGraph) -> Vec<u64>;
}

/// Colors nodes greedily in ascending id order with the smallest free color.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyColoring;

/// Greedy coloring over a node order shuffled with a fixed seed.
#[derive(Debug, Clone, Copy)]
pub struct RandomOrderColoring {
    pub seed: u64,
}

/// Serializable choice of the coloring strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Coloring {
    #[default]
    Greedy,
    RandomOrder { seed: u64 },
}

impl Coloring {
    pub fn strategy(&self) -> Box<dyn ColoringStrategy> {
        match *self {
            Coloring::Greedy => Box::new(GreedyColoring),
            Coloring::RandomOrder { seed } => Box::new(RandomOrderColoring { seed }),
        }
    }
}

fn greedy_in_order(graph: &CompressedGraph, order: impl Iterator<Item = u64>) -> Vec<u64> {
    let node_count = graph.node_count() as usize;
    let mut colors = vec![u64::MAX; node_count];
    // `taken[c] == stamp` marks color `c` as used by a neighbour of the current node.
    let mut taken = Vec::<u64>::new();
    for (stamp, node) in order.enumerate() {
        let stamp = stamp as u64;
        for target in graph.neighbours(node) {
            let color = colors[target as usize];
            if target == node || color == u64::MAX {
                continue;
            }
            if taken.len() <= color as usize {
                taken.resize(color as usize + 1, u64::MAX);
            }
            taken[color as usize] = stamp;
        }
        let free = taken
            .iter()
            .position(|&mark| mark != stamp)
            .unwrap_or(taken.len());
        colors[node as usize] = free as u64;
    }
    colors
}

impl ColoringStrategy for GreedyColoring {
    fn color(&self, graph: &CompressedGraph) -> Vec<u64> {
        greedy_in_order(graph, 0..graph.node_count())
    }
}

impl ColoringStrategy for RandomOrderColoring {
    fn color(&self, graph: &CompressedGraph) -> Vec<u64> {
        let mut order = (0..graph.node_count()).collect::<Vec<_>>();
        order.shuffle(&mut StdRng::seed_from_u64(self.seed));
        greedy_in_order(graph, order.into_iter())
    }
}

/// Groups nodes by color, each group in ascending node order.
pub fn color_classes(colors: &[u64]) -> Vec<Vec<u64>> {
    let color_count = colors.iter().max().map_or(0, |&max| max as usize + 1);
    let mut classes = vec![Vec::new(); color_count];
    for (node, &color) in colors.iter().enumerate() {
        classes[color as usize].push(node as u64);
    }
    classes
}
