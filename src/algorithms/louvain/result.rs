use serde::{Deserialize, Serialize};

use crate::dss::consecutive;

/// Outcome of a Louvain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LouvainResult {
    /// Community of every input node.
    pub communities: Vec<u64>,

    /// Modularity after every applied level, non-decreasing.
    pub modularities: Vec<f64>,

    /// Modularity of `communities`.
    pub modularity: f64,

    pub ran_levels: usize,

    /// `false` when the level limit stopped the run.
    pub did_converge: bool,

    /// Communities after each applied level, when requested.
    pub intermediate_communities: Option<Vec<Vec<u64>>>,
}

impl LouvainResult {
    pub fn community_count(&self) -> u64 {
        consecutive(&self.communities)
            .into_iter()
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Final community of `node`, `None` outside the node range.
    pub fn community_of(&self, node: u64) -> Option<u64> {
        self.communities.get(node as usize).copied()
    }
}
