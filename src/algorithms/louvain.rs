//! Louvain modularity optimization.
//!
//! Every level colors the level graph, moves nodes color by color towards the
//! neighbouring community with the best modularity score and merges the resulting
//! communities in a disjoint-set structure over the input nodes. Unless the run has
//! converged, the communities are then collapsed into the super-nodes of the next
//! level graph.

pub mod coloring;
pub mod modularity;
pub mod result;

use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::BatchQueue;
use crate::compress::Aggregation;
use crate::concurrency::{worker_pool, TerminationFlag};
use crate::config::DEFAULT_CONCURRENCY;
use crate::dss::{consecutive, DisjointSetStruct};
use crate::error::{Error, Result};
use crate::loading::{DirectIdMap, Orientation, PropertyConfig, RelationshipsBuilder, RelationshipsBuilderConfig};
use crate::paged::HugeAtomicU64Array;
use crate::progress::{ProgressTracker, Task, Tasks};
use crate::types::{CompressedGraph, WEIGHT_PROPERTY};

pub use coloring::{color_classes, Coloring, ColoringStrategy, GreedyColoring, RandomOrderColoring};
pub use modularity::{modularity, weighted_degrees};
pub use result::LouvainResult;

const DEFAULT_TOLERANCE: f64 = 1e-4;
const DEFAULT_MAX_ITERATIONS: usize = 10;
const DEFAULT_MAX_LOCAL_ITERATIONS: usize = 10;

/// Unvalidated Louvain settings; [`LouvainConfigBuilder::build`] checks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LouvainConfigBuilder {
    /// Smallest modularity gain for which another level is run.
    pub tolerance: f64,

    /// Maximum number of levels.
    pub max_iterations: usize,

    /// Maximum number of local moving sweeps within one level.
    pub max_local_iterations: usize,

    pub concurrency: usize,

    pub min_batch_size: u64,

    /// Renumber the final communities densely.
    pub consecutive_ids: bool,

    /// Keep the communities of every level.
    pub include_intermediate_communities: bool,

    pub coloring: Coloring,
}

impl Default for LouvainConfigBuilder {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_local_iterations: DEFAULT_MAX_LOCAL_ITERATIONS,
            concurrency: DEFAULT_CONCURRENCY,
            min_batch_size: 1,
            consecutive_ids: false,
            include_intermediate_communities: false,
            coloring: Coloring::Greedy,
        }
    }
}

impl LouvainConfigBuilder {
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_local_iterations(mut self, max_local_iterations: usize) -> Self {
        self.max_local_iterations = max_local_iterations;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn min_batch_size(mut self, min_batch_size: u64) -> Self {
        self.min_batch_size = min_batch_size;
        self
    }

    pub fn consecutive_ids(mut self, consecutive_ids: bool) -> Self {
        self.consecutive_ids = consecutive_ids;
        self
    }

    pub fn include_intermediate_communities(mut self, include: bool) -> Self {
        self.include_intermediate_communities = include;
        self
    }

    pub fn coloring(mut self, coloring: Coloring) -> Self {
        self.coloring = coloring;
        self
    }

    /// Validates every setting.
    ///
    /// # Returns
    /// * `Err(Error::InvalidConfiguration)` - Naming the first invalid key
    pub fn build(self) -> Result<LouvainConfig> {
        if !(self.tolerance >= 0.0) {
            return Err(Error::invalid_config(
                "tolerance",
                format!("must be a non-negative number, got {}", self.tolerance),
            ));
        }
        if self.max_iterations < 1 {
            return Err(Error::invalid_config("max_iterations", "must be at least 1"));
        }
        if self.max_local_iterations < 1 {
            return Err(Error::invalid_config("max_local_iterations", "must be at least 1"));
        }
        if self.concurrency < 1 {
            return Err(Error::invalid_config("concurrency", "must be at least 1"));
        }
        if self.min_batch_size < 1 {
            return Err(Error::invalid_config("min_batch_size", "must be at least 1"));
        }
        Ok(LouvainConfig { settings: self })
    }
}

/// Validated Louvain settings.
///
/// Deserializing goes through [`LouvainConfigBuilder::build`], so an invalid YAML
/// document fails to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LouvainConfigBuilder", into = "LouvainConfigBuilder")]
pub struct LouvainConfig {
    settings: LouvainConfigBuilder,
}

impl Default for LouvainConfig {
    fn default() -> Self {
        Self {
            settings: LouvainConfigBuilder::default(),
        }
    }
}

impl TryFrom<LouvainConfigBuilder> for LouvainConfig {
    type Error = Error;

    fn try_from(builder: LouvainConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

impl From<LouvainConfig> for LouvainConfigBuilder {
    fn from(config: LouvainConfig) -> Self {
        config.settings
    }
}

impl LouvainConfig {
    pub fn builder() -> LouvainConfigBuilder {
        LouvainConfigBuilder::default()
    }

    pub fn tolerance(&self) -> f64 {
        self.settings.tolerance
    }

    pub fn max_iterations(&self) -> usize {
        self.settings.max_iterations
    }

    pub fn max_local_iterations(&self) -> usize {
        self.settings.max_local_iterations
    }

    pub fn concurrency(&self) -> usize {
        self.settings.concurrency
    }

    pub fn min_batch_size(&self) -> u64 {
        self.settings.min_batch_size
    }

    pub fn consecutive_ids(&self) -> bool {
        self.settings.consecutive_ids
    }

    pub fn include_intermediate_communities(&self) -> bool {
        self.settings.include_intermediate_communities
    }

    pub fn coloring(&self) -> Coloring {
        self.settings.coloring
    }

    /// The same settings with another concurrency.
    pub fn with_concurrency(&self, concurrency: usize) -> Result<Self> {
        self.settings.clone().concurrency(concurrency).build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LouvainState {
    Initialized,
    /// Local moving on the given level, starting at 1.
    LocalMoving(usize),
    Converged,
    MaxIterationsReached,
}

/// One Louvain computation over `graph`.
pub struct Louvain<'a> {
    graph: &'a CompressedGraph,
    config: &'a LouvainConfig,
    tracker: &'a dyn ProgressTracker,
    termination: &'a dyn TerminationFlag,
    state: LouvainState,
}

/// Score of moving `node` into each neighbouring community.
///
/// `score(c) = k_in(node, c) - tot(c) * k(node) / M`, with `tot` excluding `node`
/// itself for its own community. Returns the community with the best score, or the
/// current community unless another one is strictly better. Ties go to the lowest id.
fn best_community(
    graph: &CompressedGraph,
    node: u64,
    communities: &[u64],
    totals: &[f64],
    degrees: &[f64],
    total_weight: f64,
    weights: &mut FxHashMap<u64, f64>,
) -> u64 {
    let current = communities[node as usize];
    if total_weight <= 0.0 {
        return current;
    }
    weights.clear();
    graph.for_each_relationship(node, |target, weight| {
        if target != node {
            *weights.entry(communities[target as usize]).or_insert(0.0) += weight;
        }
    });

    let degree = degrees[node as usize];
    let ratio = degree / total_weight;
    let stay = weights.get(&current).copied().unwrap_or(0.0) - (totals[current as usize] - degree) * ratio;
    let mut best = current;
    let mut best_score = stay;
    for (&community, &inner) in weights.iter() {
        if community == current {
            continue;
        }
        let score = inner - totals[community as usize] * ratio;
        if score > best_score || (score == best_score && community < best) {
            best = community;
            best_score = score;
        }
    }
    if best_score > stay {
        best
    } else {
        current
    }
}

impl<'a> Louvain<'a> {
    pub fn new(
        graph: &'a CompressedGraph,
        config: &'a LouvainConfig,
        tracker: &'a dyn ProgressTracker,
        termination: &'a dyn TerminationFlag,
    ) -> Self {
        Self {
            graph,
            config,
            tracker,
            termination,
            state: LouvainState::Initialized,
        }
    }

    pub fn state(&self) -> LouvainState {
        self.state
    }

    /// Progress layout of [`Louvain::compute`].
    pub fn progress_task(graph: &CompressedGraph, config: &LouvainConfig) -> Task {
        Tasks::task(
            "Louvain",
            vec![
                Tasks::leaf("Initialization", graph.node_count()),
                Tasks::iterative(
                    "Levels",
                    config.max_iterations(),
                    vec![
                        Tasks::leaf("Local moving", graph.node_count()),
                        Tasks::leaf("Aggregation", graph.relationship_count()),
                    ],
                ),
            ],
        )
    }

    fn transition(&mut self, state: LouvainState) {
        debug!(from = ?self.state, to = ?state, "louvain state");
        self.state = state;
    }

    /// Runs `step` as a progress phase, closing it as failed on error.
    fn tracked<T>(&self, description: &str, volume: u64, step: impl FnOnce() -> Result<T>) -> Result<T> {
        self.tracker.begin_sub_task(description, volume);
        match step() {
            Ok(value) => {
                self.tracker.end_sub_task(description);
                Ok(value)
            }
            Err(error) => {
                self.tracker.end_sub_task_with_failure(description);
                Err(error)
            }
        }
    }

    /// Runs levels until convergence or the level limit.
    ///
    /// # Returns
    /// * `Err(Error::Terminated)` - The termination flag was lowered
    pub fn compute(&mut self) -> Result<LouvainResult> {
        let config = self.config;
        let pool = worker_pool(config.concurrency())?;
        let node_count = self.graph.node_count();
        self.termination.assert_running()?;

        // Step 1. Symmetric level graph, degrees and the singleton modularity.
        let (mut level_graph, mut degrees, total_weight, mut previous) =
            self.tracked("Initialization", node_count, || {
                let symmetric = match self.graph.orientation() {
                    Orientation::Undirected => None,
                    _ => Some(self.symmetrize(&pool)?),
                };
                let graph = symmetric.as_ref().unwrap_or(self.graph);
                let degrees = pool.install(|| weighted_degrees(graph));
                let total_weight: f64 = degrees.iter().sum();
                let singletons = (0..node_count).collect::<Vec<_>>();
                let initial = pool.install(|| modularity(graph, &singletons, &degrees, total_weight));
                self.tracker.log_progress(node_count);
                Ok((symmetric, degrees, total_weight, initial))
            })?;

        let dss = DisjointSetStruct::new(node_count);
        let mut representatives = (0..node_count).collect::<Vec<_>>();
        let mut modularities = Vec::new();
        let mut intermediate = config.include_intermediate_communities().then(Vec::new);
        let mut ran_levels = 0;

        for level in 1.. {
            self.transition(LouvainState::LocalMoving(level));
            self.termination.assert_running()?;
            let graph = level_graph.as_ref().unwrap_or(self.graph);

            // Step 2. Local moving.
            let communities = self.tracked("Local moving", graph.node_count(), || {
                self.local_moving(graph, &degrees, total_weight, &pool)
            })?;
            let dense = consecutive(&communities);
            let community_count = dense.iter().max().map_or(0, |&max| max + 1);
            if community_count == graph.node_count() {
                debug!(level, "no node changed its community");
                self.transition(LouvainState::Converged);
                break;
            }

            let current = pool.install(|| modularity(graph, &communities, &degrees, total_weight));
            let gain = current - previous;
            if gain < 0.0 {
                debug!(level, gain, "discarding level that lowers the modularity");
                self.transition(LouvainState::Converged);
                break;
            }

            // Step 3. Merge every community of this level in the disjoint-set structure.
            let mut anchors = vec![u64::MAX; community_count as usize];
            for (node, &community) in dense.iter().enumerate() {
                if anchors[community as usize] == u64::MAX {
                    anchors[community as usize] = representatives[node];
                }
            }
            pool.install(|| {
                dense.par_iter().enumerate().for_each(|(node, &community)| {
                    dss.union(representatives[node], anchors[community as usize]);
                })
            });
            modularities.push(current);
            previous = current;
            ran_levels = level;
            if let Some(snapshots) = intermediate.as_mut() {
                snapshots.push(self.present(&dss, &pool));
            }
            debug!(level, modularity = current, communities = community_count, "level finished");

            if gain < config.tolerance() {
                self.transition(LouvainState::Converged);
                break;
            }
            if level == config.max_iterations() {
                self.transition(LouvainState::MaxIterationsReached);
                break;
            }

            // Step 4. Collapse the communities into the next level graph.
            let next = self.tracked("Aggregation", graph.relationship_count(), || {
                self.aggregate(graph, &dense, community_count, &pool)
            })?;
            degrees = pool.install(|| weighted_degrees(&next));
            // Anchors are representatives of the merged sets, one per super-node.
            representatives = anchors;
            level_graph = Some(next);
        }

        let communities = self.present(&dss, &pool);
        let did_converge = self.state == LouvainState::Converged;
        info!(
            nodes = node_count,
            levels = ran_levels,
            modularity = previous,
            did_converge,
            "louvain finished"
        );
        Ok(LouvainResult {
            communities,
            modularities,
            modularity: previous,
            ran_levels,
            did_converge,
            intermediate_communities: intermediate,
        })
    }

    fn present(&self, dss: &DisjointSetStruct, pool: &ThreadPool) -> Vec<u64> {
        pool.install(|| {
            if self.config.consecutive_ids() {
                dss.consecutive_ids()
            } else {
                dss.to_communities()
            }
        })
    }

    /// Colored sweeps over the level graph until no node moves.
    ///
    /// Nodes of one color decide in parallel against a snapshot of the communities;
    /// the decisions are applied afterwards in ascending node order.
    fn local_moving(
        &self,
        graph: &CompressedGraph,
        degrees: &[f64],
        total_weight: f64,
        pool: &ThreadPool,
    ) -> Result<Vec<u64>> {
        let config = self.config;
        let node_count = graph.node_count();
        let colors = config.coloring().strategy().color(graph);
        let classes = color_classes(&colors);
        let mut communities = (0..node_count).collect::<Vec<_>>();
        let mut totals = degrees.to_vec();
        let decisions = HugeAtomicU64Array::new(node_count);

        for sweep in 0..config.max_local_iterations() {
            let mut moves = 0u64;
            for class in &classes {
                let queue = BatchQueue::consecutive_with(class.len() as u64, config.min_batch_size(), config.concurrency());
                let snapshot = &communities;
                let snapshot_totals = &totals;
                queue.parallel_consume_in(pool, config.concurrency(), self.termination, |batch| {
                    let mut weights = FxHashMap::default();
                    for index in batch.element_ids() {
                        let node = class[index as usize];
                        let best = best_community(
                            graph,
                            node,
                            snapshot,
                            snapshot_totals,
                            degrees,
                            total_weight,
                            &mut weights,
                        );
                        decisions.set(node, best);
                    }
                    self.tracker.log_progress(batch.size());
                    Ok(())
                })?;

                for &node in class {
                    let target = decisions.get(node);
                    let current = communities[node as usize];
                    if target != current {
                        let degree = degrees[node as usize];
                        totals[current as usize] -= degree;
                        totals[target as usize] += degree;
                        communities[node as usize] = target;
                        moves += 1;
                    }
                }
            }
            debug!(sweep, moves, colors = classes.len(), "local moving sweep");
            if moves == 0 {
                break;
            }
        }
        Ok(communities)
    }

    /// Visits every node of `graph` in consecutive batches on `pool`.
    ///
    /// The termination flag is checked before each batch; `visit` records the first
    /// failure of a node in its second argument, which ends the batch.
    fn relationship_batches<F>(&self, graph: &CompressedGraph, pool: &ThreadPool, visit: F) -> Result<()>
    where
        F: Fn(u64, &mut Result<()>) + Sync,
    {
        let config = self.config;
        let queue = BatchQueue::consecutive_with(graph.node_count(), config.min_batch_size(), config.concurrency());
        queue.parallel_consume_in(pool, config.concurrency(), self.termination, |batch| {
            let mut added = Ok(());
            for node in batch.element_ids() {
                visit(node, &mut added);
                if added.is_err() {
                    break;
                }
            }
            added
        })
    }

    /// Symmetric copy of a directed input graph; parallel relationships are summed.
    fn symmetrize(&self, pool: &ThreadPool) -> Result<CompressedGraph> {
        let graph = self.graph;
        let builder = RelationshipsBuilder::new(
            Arc::new(DirectIdMap::new(graph.node_count())),
            RelationshipsBuilderConfig::default()
                .with_orientation(Orientation::Undirected)
                .with_aggregation(Aggregation::Sum)
                .with_property(PropertyConfig::new(WEIGHT_PROPERTY))
                .with_concurrency(self.config.concurrency()),
        )?;
        self.relationship_batches(graph, pool, |node, added| {
            graph.for_each_relationship(node, |target, weight| {
                if added.is_ok() {
                    *added = builder.add_from_internal(node, target, &[weight]);
                }
            });
        })?;
        Ok(CompressedGraph::new(builder.build_in(pool, self.termination)?, None))
    }

    /// Super-node graph of `dense` communities.
    ///
    /// Every adjacency entry becomes a relationship between the communities of its
    /// endpoints, so self loops keep the inner weight and the result stays symmetric.
    fn aggregate(
        &self,
        graph: &CompressedGraph,
        dense: &[u64],
        community_count: u64,
        pool: &ThreadPool,
    ) -> Result<CompressedGraph> {
        let builder = RelationshipsBuilder::new(
            Arc::new(DirectIdMap::new(community_count)),
            RelationshipsBuilderConfig::default()
                .with_aggregation(Aggregation::Sum)
                .with_property(PropertyConfig::new(WEIGHT_PROPERTY))
                .with_concurrency(self.config.concurrency()),
        )?;
        self.relationship_batches(graph, pool, |node, added| {
            let source = dense[node as usize];
            graph.for_each_relationship(node, |target, weight| {
                if added.is_ok() {
                    *added = builder.add_from_internal(source, dense[target as usize], &[weight]);
                }
            });
            self.tracker.log_progress(graph.degree(node));
        })?;
        let aggregated = CompressedGraph::new(builder.build_in(pool, self.termination)?, None);
        debug!(
            nodes = aggregated.node_count(),
            relationships = aggregated.relationship_count(),
            "aggregated level graph"
        );
        Ok(aggregated)
    }
}

#[cfg(test)]
mod test_louvain {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::concurrency::{TerminationSignal, RUNNING_TRUE};
    use crate::progress::EmptyProgressTracker;

    use super::*;

    fn run(graph: &CompressedGraph, config: &LouvainConfig) -> Result<LouvainResult> {
        Louvain::new(graph, config, &EmptyProgressTracker, &RUNNING_TRUE).compute()
    }

    fn undirected(node_count: u64, edges: &[(u64, u64)]) -> CompressedGraph {
        let edges = edges.iter().map(|&(a, b)| (a, b, 1.0)).collect::<Vec<_>>();
        CompressedGraph::from_edges(node_count, &edges, Orientation::Undirected, 2).unwrap()
    }

    /// Two triangles joined by one bridge.
    const BARBELL: [(u64, u64); 7] = [(0, 1), (1, 2), (0, 2), (3, 4), (4, 5), (3, 5), (2, 3)];

    fn line(node_count: u64) -> CompressedGraph {
        let edges = (1..node_count).map(|node| (node - 1, node)).collect::<Vec<_>>();
        undirected(node_count, &edges)
    }

    /// Dense groups of eight with a few random links between groups.
    fn planted(groups: u64, seed: u64) -> CompressedGraph {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut edges = Vec::new();
        for group in 0..groups {
            let base = group * 8;
            for a in 0..8 {
                for b in (a + 1)..8 {
                    if rng.gen_bool(0.7) {
                        edges.push((base + a, base + b));
                    }
                }
            }
        }
        for _ in 0..groups * 2 {
            edges.push((rng.gen_range(0..groups * 8), rng.gen_range(0..groups * 8)));
        }
        undirected(groups * 8, &edges)
    }

    fn community_count(result: &LouvainResult) -> u64 {
        result.community_count()
    }

    #[test]
    fn test_barbell_splits_into_triangles() {
        let graph = undirected(6, &BARBELL);
        let config = LouvainConfig::builder().consecutive_ids(true).build().unwrap();
        let result = run(&graph, &config).unwrap();
        assert_eq!(result.communities, vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(result.community_of(4), Some(1));
        assert_eq!(result.community_of(6), None);
        assert!((result.modularity - (12.0 / 14.0 - 0.5)).abs() < 1e-9);
        assert_eq!(result.ran_levels, 1);
        assert!(result.did_converge);
    }

    #[test]
    fn test_directed_input_is_symmetrized() {
        let edges = BARBELL.map(|(a, b)| (a, b, 1.0));
        let graph = CompressedGraph::from_edges(6, &edges, Orientation::Natural, 2).unwrap();
        let config = LouvainConfig::builder().consecutive_ids(true).build().unwrap();
        let result = run(&graph, &config).unwrap();
        assert_eq!(result.communities, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_line_graph_levels_only_merge() {
        let graph = line(32);
        let one = LouvainConfig::builder().max_iterations(1).build().unwrap();
        let two = LouvainConfig::builder().max_iterations(2).build().unwrap();
        let first = run(&graph, &one).unwrap();
        let second = run(&graph, &two).unwrap();
        assert!(community_count(&second) <= community_count(&first));
        assert_eq!(first.ran_levels, 1);
        assert!(!first.did_converge);
    }

    #[test]
    fn test_modularities_are_non_decreasing() {
        for seed in 0..4 {
            let graph = planted(12, seed);
            let config = LouvainConfig::builder()
                .tolerance(0.0)
                .include_intermediate_communities(true)
                .build()
                .unwrap();
            let result = run(&graph, &config).unwrap();
            assert!(result
                .modularities
                .windows(2)
                .all(|pair| pair[0] <= pair[1]));
            assert_eq!(result.modularities.len(), result.ran_levels);
            let intermediate = result.intermediate_communities.as_ref().unwrap();
            assert_eq!(intermediate.len(), result.ran_levels);
            assert_eq!(intermediate.last(), Some(&result.communities));

            // The final modularity matches the communities on the input graph.
            let degrees = weighted_degrees(&graph);
            let total = degrees.iter().sum();
            let expected = modularity(&graph, &result.communities, &degrees, total);
            assert!((result.modularity - expected).abs() < 1e-9);
            assert!(result.modularity > 0.5);
        }
    }

    #[test]
    fn test_random_order_coloring_finds_the_same_split() {
        let graph = undirected(6, &BARBELL);
        let config = LouvainConfig::builder()
            .coloring(Coloring::RandomOrder { seed: 5 })
            .consecutive_ids(true)
            .build()
            .unwrap();
        let result = run(&graph, &config).unwrap();
        assert_eq!(community_count(&result), 2);
        assert_eq!(result.communities[0], result.communities[2]);
        assert_ne!(result.communities[0], result.communities[5]);
    }

    #[test]
    fn test_graph_without_relationships() {
        let graph = undirected(4, &[]);
        let result = run(&graph, &LouvainConfig::default()).unwrap();
        assert_eq!(result.communities, vec![0, 1, 2, 3]);
        assert_eq!(result.ran_levels, 0);
        assert_eq!(result.modularity, 0.0);
        assert!(result.did_converge);
    }

    #[test]
    fn test_invalid_configurations() {
        let invalid = [
            LouvainConfig::builder().tolerance(-0.1),
            LouvainConfig::builder().tolerance(f64::NAN),
            LouvainConfig::builder().max_iterations(0),
            LouvainConfig::builder().max_local_iterations(0),
            LouvainConfig::builder().concurrency(0),
            LouvainConfig::builder().min_batch_size(0),
        ];
        for builder in invalid {
            assert!(builder.build().unwrap_err().is_configuration());
        }
    }

    #[test]
    fn test_yaml_config_is_validated() {
        let config: LouvainConfig =
            serde_yaml::from_str("tolerance: 0.01\ncoloring:\n  type: random_order\n  seed: 3\n").unwrap();
        assert_eq!(config.tolerance(), 0.01);
        assert_eq!(config.coloring(), Coloring::RandomOrder { seed: 3 });
        assert_eq!(config.max_iterations(), DEFAULT_MAX_ITERATIONS);
        assert!(serde_yaml::from_str::<LouvainConfig>("max_iterations: 0\n").is_err());
    }

    /// Lowers its signal as soon as `phase` begins and counts the work done afterwards.
    struct StopAtPhase {
        phase: &'static str,
        signal: TerminationSignal,
        stopped: AtomicBool,
        progress_after_stop: AtomicU64,
        failed: Mutex<Vec<String>>,
    }

    impl StopAtPhase {
        fn new(phase: &'static str) -> Self {
            Self {
                phase,
                signal: TerminationSignal::new(),
                stopped: AtomicBool::new(false),
                progress_after_stop: AtomicU64::new(0),
                failed: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProgressTracker for StopAtPhase {
        fn begin_sub_task(&self, description: &str, _volume: u64) {
            if description == self.phase {
                self.signal.terminate();
                self.stopped.store(true, Ordering::Release);
            }
        }

        fn log_progress(&self, delta: u64) {
            if self.stopped.load(Ordering::Acquire) {
                self.progress_after_stop.fetch_add(delta, Ordering::Relaxed);
            }
        }

        fn log_message(&self, _message: &str) {}

        fn end_sub_task(&self, _description: &str) {}

        fn end_sub_task_with_failure(&self, description: &str) {
            self.failed.lock().unwrap().push(description.to_string());
        }
    }

    #[test]
    fn test_stopped_during_local_moving() {
        let graph = line(2_000);
        let config = LouvainConfig::default();
        let tracker = StopAtPhase::new("Local moving");
        let mut louvain = Louvain::new(&graph, &config, &tracker, &tracker.signal);
        let error = louvain.compute().unwrap_err();
        assert!(error.is_terminated());
        assert_eq!(louvain.state(), LouvainState::LocalMoving(1));
        assert_eq!(tracker.progress_after_stop.load(Ordering::Relaxed), 0);
        assert_eq!(*tracker.failed.lock().unwrap(), vec!["Local moving".to_string()]);
    }

    /// No relationship is collapsed into the next level once the flag is lowered.
    #[test]
    fn test_stopped_during_aggregation() {
        let graph = line(20_000);
        let config = LouvainConfig::default();
        let tracker = StopAtPhase::new("Aggregation");
        let mut louvain = Louvain::new(&graph, &config, &tracker, &tracker.signal);
        let error = louvain.compute().unwrap_err();
        assert!(error.is_terminated());
        assert_eq!(louvain.state(), LouvainState::LocalMoving(1));
        assert_eq!(tracker.progress_after_stop.load(Ordering::Relaxed), 0);
        assert_eq!(*tracker.failed.lock().unwrap(), vec!["Aggregation".to_string()]);
    }

    #[test]
    fn test_terminated_run() {
        let graph = line(10);
        let config = LouvainConfig::default();
        let signal = TerminationSignal::terminated();
        let mut louvain = Louvain::new(&graph, &config, &EmptyProgressTracker, &signal);
        let error = louvain.compute().unwrap_err();
        assert!(error.is_terminated());
        assert_eq!(louvain.state(), LouvainState::Initialized);
    }
}
