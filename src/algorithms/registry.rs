use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::algorithms::louvain::{Louvain, LouvainConfig, LouvainResult};
use crate::algorithms::wcc::{WCCConfig, WCCController, WCCResult};
use crate::concurrency::{TerminationFlag, RUNNING_TRUE};
use crate::config::{EngineConfig, DEFAULT_CONCURRENCY};
use crate::error::{Error, Result};
use crate::progress::{Task, TaskProgressTracker};
use crate::types::CompressedGraph;

/// Estimated heap usage of a computation in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRange {
    pub min: u64,
    pub max: u64,
}

impl MemoryRange {
    pub fn of(bytes: u64) -> Self {
        Self { min: bytes, max: bytes }
    }

    pub fn between(min: u64, max: u64) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn add(self, other: MemoryRange) -> Self {
        Self {
            min: self.min.saturating_add(other.min),
            max: self.max.saturating_add(other.max),
        }
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{} Bytes", self.min)
        } else {
            write!(f, "[{} Bytes ... {} Bytes]", self.min, self.max)
        }
    }
}

/// Configuration of one registered algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmConfig {
    Louvain(LouvainConfig),
    Wcc(WCCConfig),
}

impl AlgorithmConfig {
    /// Name of the algorithm this configuration belongs to.
    pub fn kind(&self) -> &'static str {
        match self {
            AlgorithmConfig::Louvain(_) => LouvainAlgorithm::NAME,
            AlgorithmConfig::Wcc(_) => WCCAlgorithm::NAME,
        }
    }
}

/// Result of one registered algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum AlgorithmResult {
    Louvain(LouvainResult),
    Wcc(WCCResult),
}

impl AlgorithmResult {
    /// Community or component id of every node.
    pub fn node_labels(&self) -> &[u64] {
        match self {
            AlgorithmResult::Louvain(result) => &result.communities,
            AlgorithmResult::Wcc(result) => &result.component_ids,
        }
    }
}

/// Everything an algorithm needs besides its graph and configuration.
#[derive(Clone)]
pub struct ExecutionContext {
    termination: Arc<dyn TerminationFlag + Send>,
    show_progress: bool,
    concurrency: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            termination: Arc::new(RUNNING_TRUE),
            show_progress: false,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ExecutionContext {
    /// Takes progress and concurrency defaults from `config`.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self {
            show_progress: config.show_progress,
            concurrency: config.concurrency,
            ..Self::default()
        }
    }

    pub fn with_termination(mut self, termination: Arc<dyn TerminationFlag + Send>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn termination(&self) -> &dyn TerminationFlag {
        self.termination.as_ref()
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// A tracker logging the phases of `task`, with bars when progress is shown.
    pub fn tracker(&self, task: Task) -> TaskProgressTracker {
        TaskProgressTracker::new(task, self.show_progress)
    }
}

/// A graph algorithm that can be dispatched by name.
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// The default configuration for runs without an explicit one.
    fn default_config(&self, context: &ExecutionContext) -> AlgorithmConfig;

    /// Heap usage of a run on a graph of the given size.
    fn estimate_memory(&self, node_count: u64, relationship_count: u64, config: &AlgorithmConfig) -> Result<MemoryRange>;

    /// Progress layout of a run.
    fn progress_task(&self, graph: &CompressedGraph, config: &AlgorithmConfig) -> Result<Task>;

    fn compute(
        &self,
        graph: Arc<CompressedGraph>,
        config: &AlgorithmConfig,
        context: &ExecutionContext,
    ) -> Result<AlgorithmResult>;
}

fn wrong_kind(algorithm: &str, config: &AlgorithmConfig) -> Error {
    Error::ConfigurationKind {
        algorithm: algorithm.to_string(),
        config: config.kind().to_string(),
    }
}

const U64_BYTES: u64 = std::mem::size_of::<u64>() as u64;

/// Disjoint-set parents and sizes.
fn dss_bytes(node_count: u64) -> u64 {
    node_count * 2 * U64_BYTES
}

pub struct LouvainAlgorithm;

impl LouvainAlgorithm {
    pub const NAME: &'static str = "louvain";

    fn config<'c>(&self, config: &'c AlgorithmConfig) -> Result<&'c LouvainConfig> {
        match config {
            AlgorithmConfig::Louvain(louvain) => Ok(louvain),
            other => Err(wrong_kind(Self::NAME, other)),
        }
    }
}

impl Algorithm for LouvainAlgorithm {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_config(&self, context: &ExecutionContext) -> AlgorithmConfig {
        let config = LouvainConfig::default();
        AlgorithmConfig::Louvain(config.with_concurrency(context.concurrency()).unwrap_or(config))
    }

    /// Per node: parents, sizes, communities, degrees, totals, colors and decisions.
    /// At most one aggregated level graph with a target and a weight per relationship
    /// exists besides the input.
    fn estimate_memory(&self, node_count: u64, relationship_count: u64, config: &AlgorithmConfig) -> Result<MemoryRange> {
        let config = self.config(config)?;
        let per_node = dss_bytes(node_count) + node_count * 5 * U64_BYTES;
        let intermediate = if config.include_intermediate_communities() {
            MemoryRange::between(node_count * U64_BYTES, node_count * U64_BYTES * config.max_iterations() as u64)
        } else {
            MemoryRange::of(0)
        };
        let level_graph = node_count * 2 * U64_BYTES + relationship_count * 2 * 2 * U64_BYTES;
        Ok(MemoryRange::between(per_node, per_node + level_graph).add(intermediate))
    }

    fn progress_task(&self, graph: &CompressedGraph, config: &AlgorithmConfig) -> Result<Task> {
        Ok(Louvain::progress_task(graph, self.config(config)?))
    }

    fn compute(
        &self,
        graph: Arc<CompressedGraph>,
        config: &AlgorithmConfig,
        context: &ExecutionContext,
    ) -> Result<AlgorithmResult> {
        let config = self.config(config)?;
        let tracker = context.tracker(Louvain::progress_task(&graph, config));
        let result = Louvain::new(&graph, config, &tracker, context.termination()).compute()?;
        Ok(AlgorithmResult::Louvain(result))
    }
}

pub struct WCCAlgorithm;

impl WCCAlgorithm {
    pub const NAME: &'static str = "wcc";

    fn config<'c>(&self, config: &'c AlgorithmConfig) -> Result<&'c WCCConfig> {
        match config {
            AlgorithmConfig::Wcc(wcc) => Ok(wcc),
            other => Err(wrong_kind(Self::NAME, other)),
        }
    }
}

impl Algorithm for WCCAlgorithm {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_config(&self, context: &ExecutionContext) -> AlgorithmConfig {
        AlgorithmConfig::Wcc(WCCConfig {
            thread_num: context.concurrency(),
            ..WCCConfig::default()
        })
    }

    /// Parents, sizes, representatives and component ids.
    fn estimate_memory(&self, node_count: u64, _relationship_count: u64, config: &AlgorithmConfig) -> Result<MemoryRange> {
        self.config(config)?;
        Ok(MemoryRange::of(dss_bytes(node_count) + node_count * 2 * U64_BYTES))
    }

    fn progress_task(&self, graph: &CompressedGraph, config: &AlgorithmConfig) -> Result<Task> {
        self.config(config)?;
        Ok(WCCController::progress_task(graph))
    }

    fn compute(
        &self,
        graph: Arc<CompressedGraph>,
        config: &AlgorithmConfig,
        context: &ExecutionContext,
    ) -> Result<AlgorithmResult> {
        let config = self.config(config)?;
        let tracker = context.tracker(WCCController::progress_task(&graph));
        let result = WCCController::new(graph).compute(config, &tracker, context.termination())?;
        Ok(AlgorithmResult::Wcc(result))
    }
}

/// Algorithms by name.
#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: FxHashMap<&'static str, Box<dyn Algorithm>>,
}

impl AlgorithmRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in algorithm.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(LouvainAlgorithm));
        registry.register(Box::new(WCCAlgorithm));
        registry
    }

    /// Adds `algorithm`, replacing one registered under the same name.
    pub fn register(&mut self, algorithm: Box<dyn Algorithm>) {
        self.algorithms.insert(algorithm.name(), algorithm);
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = self.algorithms.keys().copied().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    /// # Returns
    /// * `Err(Error::UnknownAlgorithm)` - Nothing is registered under `name`
    pub fn get(&self, name: &str) -> Result<&dyn Algorithm> {
        self.algorithms
            .get(name.to_ascii_lowercase().as_str())
            .map(|algorithm| algorithm.as_ref())
            .ok_or_else(|| Error::UnknownAlgorithm(name.to_string()))
    }

    /// Looks up `name` and runs it; `config` defaults to the algorithm's default configuration.
    pub fn run(
        &self,
        name: &str,
        graph: Arc<CompressedGraph>,
        config: Option<&AlgorithmConfig>,
        context: &ExecutionContext,
    ) -> Result<AlgorithmResult> {
        let algorithm = self.get(name)?;
        let default_config;
        let config = match config {
            Some(config) => config,
            None => {
                default_config = algorithm.default_config(context);
                &default_config
            }
        };
        algorithm.compute(graph, config, context)
    }
}

#[cfg(test)]
mod test_registry {
    use crate::concurrency::TerminationSignal;
    use crate::loading::Orientation;

    use super::*;

    fn two_pairs() -> Arc<CompressedGraph> {
        let edges = [(0, 1, 1.0), (2, 3, 1.0)];
        Arc::new(CompressedGraph::from_edges(4, &edges, Orientation::Undirected, 2).unwrap())
    }

    #[test]
    fn test_dispatch_by_name() {
        let registry = AlgorithmRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["louvain", "wcc"]);
        let context = ExecutionContext::default().with_concurrency(2);

        let wcc = registry.run("WCC", two_pairs(), None, &context).unwrap();
        assert_eq!(wcc.node_labels(), &[0, 0, 1, 1]);

        let louvain = registry.run("louvain", two_pairs(), None, &context).unwrap();
        let labels = louvain.node_labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_unknown_algorithm() {
        let registry = AlgorithmRegistry::with_defaults();
        let error = registry
            .run("pagerank", two_pairs(), None, &ExecutionContext::default())
            .unwrap_err();
        assert!(matches!(error, Error::UnknownAlgorithm(ref name) if name == "pagerank"));
    }

    #[test]
    fn test_configuration_of_other_algorithm() {
        let registry = AlgorithmRegistry::with_defaults();
        let config = AlgorithmConfig::Wcc(WCCConfig::default());
        let error = registry
            .run("louvain", two_pairs(), Some(&config), &ExecutionContext::default())
            .unwrap_err();
        assert!(error.is_configuration());
        assert!(registry.get("louvain").unwrap().estimate_memory(10, 10, &config).is_err());
    }

    #[test]
    fn test_memory_estimates_grow_with_graph() {
        let registry = AlgorithmRegistry::with_defaults();
        let context = ExecutionContext::default();
        for name in registry.names() {
            let algorithm = registry.get(name).unwrap();
            let config = algorithm.default_config(&context);
            let small = algorithm.estimate_memory(100, 1_000, &config).unwrap();
            let large = algorithm.estimate_memory(10_000, 100_000, &config).unwrap();
            assert!(small.min <= small.max);
            assert!(small.max < large.max, "{name}");
        }
    }

    #[test]
    fn test_tagged_config_from_yaml() {
        let config: AlgorithmConfig = serde_yaml::from_str("algorithm: louvain\nmax_iterations: 3\n").unwrap();
        match config {
            AlgorithmConfig::Louvain(louvain) => assert_eq!(louvain.max_iterations(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(serde_yaml::from_str::<AlgorithmConfig>("algorithm: louvain\ntolerance: -1\n").is_err());
    }

    #[test]
    fn test_context_termination() {
        let registry = AlgorithmRegistry::with_defaults();
        let context = ExecutionContext::default().with_termination(Arc::new(TerminationSignal::terminated()));
        let error = registry.run("wcc", two_pairs(), None, &context).unwrap_err();
        assert!(error.is_terminated());
    }
}
