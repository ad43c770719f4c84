use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{degree_partition, BatchQueue};
use crate::concurrency::{worker_pool, TerminationFlag, RUNNING_TRUE};
use crate::config::DEFAULT_CONCURRENCY;
use crate::dss::{consecutive, DisjointSetStruct};
use crate::error::{Error, Result};
use crate::progress::{EmptyProgressTracker, ProgressTracker, Task, Tasks};
use crate::types::CompressedGraph;

/// Configuration for Weakly Connected Components (WCC) algorithm.
///
/// # Fields
///
/// * `thread_num` - The number of threads to use for parallel computation.
/// * `min_batch_size` - Lower bound on the relationship volume of one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WCCConfig {
    pub thread_num: usize,
    pub min_batch_size: u64,
}

impl Default for WCCConfig {
    fn default() -> Self {
        Self {
            thread_num: DEFAULT_CONCURRENCY,
            min_batch_size: 1,
        }
    }
}

impl WCCConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thread_num < 1 {
            return Err(Error::invalid_config("thread_num", "must be at least 1"));
        }
        if self.min_batch_size < 1 {
            return Err(Error::invalid_config("min_batch_size", "must be at least 1"));
        }
        Ok(())
    }
}

/// Per-node component ids of one WCC run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WCCResult {
    /// Dense component id of every node, numbered by first appearance.
    pub component_ids: Vec<u64>,
    pub component_count: u64,
}

impl WCCResult {
    /// Groups the nodes by component; components are ordered by their smallest node.
    pub fn components(&self) -> Vec<Vec<u64>> {
        let mut components = vec![Vec::new(); self.component_count as usize];
        for (node, &component) in self.component_ids.iter().enumerate() {
            components[component as usize].push(node as u64);
        }
        components
    }
}

/// Trait for computing Weakly Connected Components (WCC) in a graph.
///
/// A weakly connected component is a maximal subgraph where there exists a path
/// between any two vertices, ignoring edge directions.
///
/// # Methods
///
/// * `count_wcc` - Returns the total number of weakly connected components.
/// * `wcc` - Returns all weakly connected components as vectors of node identifiers.
pub trait WCC<T> {
    fn count_wcc(&self, wcc_config: WCCConfig) -> Result<T>;
    fn wcc(&self, wcc_config: WCCConfig) -> Result<Vec<Vec<T>>>;
}

/// Controller for Weakly Connected Components (WCC) operations.
///
/// # Fields
///
/// * `graph` - Thread-safe reference to the compressed graph to analyse.
pub struct WCCController {
    graph: Arc<CompressedGraph>,
}

impl WCCController {
    /// Creates a new WCC controller over `graph`.
    pub fn new(graph: Arc<CompressedGraph>) -> Self {
        Self { graph }
    }

    /// Progress layout of [`WCCController::compute`].
    pub fn progress_task(graph: &CompressedGraph) -> Task {
        Tasks::task(
            "WCC",
            vec![
                Tasks::leaf("Union", graph.node_count()),
                Tasks::leaf("Components", graph.node_count()),
            ],
        )
    }

    /// Unions the endpoints of every relationship and labels the resulting sets.
    ///
    /// # Algorithm
    ///
    /// 1. Splits the nodes into partitions of similar relationship volume
    /// 2. Workers pop partitions and union each node with all of its targets
    /// 3. Set representatives are renumbered densely
    ///
    /// # Returns
    /// * `Err(Error::Terminated)` - `termination` was lowered between two batches
    pub fn compute(
        &self,
        wcc_config: &WCCConfig,
        tracker: &dyn ProgressTracker,
        termination: &dyn TerminationFlag,
    ) -> Result<WCCResult> {
        wcc_config.validate()?;
        let graph = &self.graph;
        let node_count = graph.node_count();

        // Step 1. Partition by degree so every batch carries a similar volume.
        let partitions = degree_partition(
            node_count,
            graph.relationship_count(),
            |node| graph.degree(node),
            wcc_config.thread_num,
            wcc_config.min_batch_size,
        );
        let queue = BatchQueue::from_partitions(partitions);
        let pool = worker_pool(wcc_config.thread_num)?;

        // Step 2. Concurrent unions.
        let dss = DisjointSetStruct::new(node_count);
        tracker.begin_sub_task("Union", node_count);
        let unions = queue.parallel_consume_in(&pool, wcc_config.thread_num, termination, |batch| {
            for node in batch.element_ids() {
                for target in graph.neighbours(node) {
                    dss.union(node, target);
                }
            }
            tracker.log_progress(batch.size());
            Ok(())
        });
        if let Err(error) = unions {
            tracker.end_sub_task_with_failure("Union");
            return Err(error);
        }
        tracker.end_sub_task("Union");

        // Step 3. Dense component ids.
        tracker.begin_sub_task("Components", node_count);
        let component_ids = pool.install(|| consecutive(&dss.to_communities()));
        let component_count = component_ids.iter().max().map_or(0, |&max| max + 1);
        tracker.log_progress(node_count);
        tracker.end_sub_task("Components");

        info!(nodes = node_count, components = component_count, "wcc finished");
        Ok(WCCResult {
            component_ids,
            component_count,
        })
    }
}

impl WCC<u64> for WCCController {
    /// Returns the total count of weakly connected components.
    fn count_wcc(&self, wcc_config: WCCConfig) -> Result<u64> {
        Ok(self
            .compute(&wcc_config, &EmptyProgressTracker, &RUNNING_TRUE)?
            .component_count)
    }

    /// Retrieves all weakly connected components as vectors of vertex ids.
    ///
    /// # Returns
    ///
    /// One ascending vertex list per component, ordered by the smallest vertex.
    fn wcc(&self, wcc_config: WCCConfig) -> Result<Vec<Vec<u64>>> {
        Ok(self
            .compute(&wcc_config, &EmptyProgressTracker, &RUNNING_TRUE)?
            .components())
    }
}
