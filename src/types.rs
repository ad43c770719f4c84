use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adjacency::AdjacencyCursor;
use crate::compress::Aggregation;
use crate::concurrency::TerminationFlag;
use crate::config::{DEFAULT_CONCURRENCY, LOCAL_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::loading::{
    ArrayIdMap, DirectIdMap, IdMapBuilder, Orientation, PartialIdMap, PropertyConfig,
    RelationshipProperty, RelationshipsBuilder, RelationshipsBuilderConfig, SingleTypeRelationships,
};
use crate::progress::{ProgressTracker, Tasks, TaskProgressTracker};
use crate::types::graph_query::GraphQuery;

pub mod graph_query;

/// Key of the relationship property read from the fourth column of edge lines.
pub const WEIGHT_PROPERTY: &str = "weight";

/// A loaded graph: compressed topology, optional weights and the original ids.
///
/// Internal node ids are dense in `[0, node_count)`. When the graph was loaded
/// without a `t` header the original ids are kept for translating results back.
#[derive(Debug)]
pub struct CompressedGraph {
    relationships: SingleTypeRelationships,
    original_ids: Option<Arc<ArrayIdMap>>,
}

/// Settings for [`CompressedGraph::from_graph_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphFileConfig {
    pub orientation: Orientation,

    /// Aggregation of parallel edges.
    pub aggregation: Aggregation,

    /// Drop edges whose endpoints are outside the declared node range.
    pub skip_dangling: bool,

    pub concurrency: usize,

    /// Relationships buffered per builder slot before a flush.
    pub buffer_size: usize,

    pub show_progress: bool,
}

impl Default for GraphFileConfig {
    fn default() -> Self {
        Self {
            orientation: Orientation::Natural,
            aggregation: Aggregation::None,
            skip_dangling: false,
            concurrency: DEFAULT_CONCURRENCY,
            buffer_size: LOCAL_BUFFER_SIZE,
            show_progress: false,
        }
    }
}

/// One parsed line of a graph file.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Record {
    Header { node_count: u64, edge_count: u64 },
    Vertex(i64),
    Edge(i64, i64, Option<f64>),
    Skip,
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| parse_error(line, format!("missing {what}")))?;
    token
        .parse::<T>()
        .map_err(|_| parse_error(line, format!("invalid {what} '{token}'")))
}

/// Parses `t <nodes> <edges>`, `v <id> ...` and `e <src> <dst> [weight]` lines.
/// Blank lines and lines starting with `#` or `%` are skipped.
fn parse_line(line: usize, bytes: &[u8]) -> Result<Record> {
    let text = std::str::from_utf8(bytes).map_err(|_| parse_error(line, "not valid UTF-8"))?;
    let mut tokens = text.split_whitespace();
    match tokens.next() {
        None => Ok(Record::Skip),
        Some(tag) if tag.starts_with('#') || tag.starts_with('%') => Ok(Record::Skip),
        Some("t") => Ok(Record::Header {
            node_count: parse_token(tokens.next(), line, "node count")?,
            edge_count: parse_token(tokens.next(), line, "edge count")?,
        }),
        Some("v") => Ok(Record::Vertex(parse_token(tokens.next(), line, "vertex id")?)),
        Some("e") => {
            let source = parse_token(tokens.next(), line, "source id")?;
            let target = parse_token(tokens.next(), line, "target id")?;
            let weight = tokens
                .next()
                .map(|token| parse_token::<f64>(Some(token), line, "weight"))
                .transpose()?;
            Ok(Record::Edge(source, target, weight))
        }
        Some(tag) => Err(parse_error(line, format!("unknown line type '{tag}'"))),
    }
}

impl CompressedGraph {
    /// Wraps built relationships; `original_ids` is `None` for identity-mapped graphs.
    pub fn new(relationships: SingleTypeRelationships, original_ids: Option<Arc<ArrayIdMap>>) -> Self {
        Self {
            relationships,
            original_ids,
        }
    }

    /// Loads a graph file through a memory map.
    ///
    /// With a leading `t <nodes> <edges>` header the ids are used as internal ids and
    /// must lie in `[0, nodes)`. Without it, the ids of all `v` and `e` lines are
    /// collected and mapped densely in ascending order. When any edge line carries a
    /// fourth column, the graph gets a `weight` property (missing values default to 1).
    ///
    /// # Returns
    /// * `Err(Error::Io)` - The file cannot be opened or mapped
    /// * `Err(Error::Parse)` - A line is malformed, with its 1-based line number
    pub fn from_graph_file(
        file_path: impl AsRef<Path>,
        config: &GraphFileConfig,
        termination: &dyn TerminationFlag,
    ) -> Result<Self> {
        // Step 1. Map the file and parse all lines in parallel.
        let graph_file = File::open(file_path.as_ref())?;
        let graph_map = unsafe { Mmap::map(&graph_file)? };
        let lines = graph_map.split(|&byte| byte == b'\n').collect::<Vec<_>>();

        let tracker = TaskProgressTracker::new(
            Tasks::task(
                "Graph Loading",
                vec![Tasks::leaf("Parse", lines.len() as u64), Tasks::leaf("Build", 0)],
            ),
            config.show_progress,
        );
        tracker.begin_sub_task("Parse", lines.len() as u64);
        let records = lines
            .par_iter()
            .enumerate()
            .map(|(index, bytes)| {
                let record = parse_line(index + 1, bytes);
                tracker.log_progress(1);
                record
            })
            .collect::<Result<Vec<_>>>();
        let records = match records {
            Ok(records) => records,
            Err(error) => {
                tracker.end_sub_task_with_failure("Parse");
                return Err(error);
            }
        };
        tracker.end_sub_task("Parse");
        termination.assert_running()?;

        // Step 2. Choose the id map and the property layout.
        let header = records.iter().find_map(|record| match record {
            Record::Header { node_count, edge_count } => Some((*node_count, *edge_count)),
            _ => None,
        });
        let (id_map, original_ids): (Arc<dyn PartialIdMap>, Option<Arc<ArrayIdMap>>) = match header {
            Some((node_count, _)) => {
                let id_map: Arc<dyn PartialIdMap> = Arc::new(DirectIdMap::new(node_count));
                (id_map, None)
            }
            None => {
                let ids = IdMapBuilder::new();
                records.par_iter().for_each(|record| match *record {
                    Record::Vertex(id) => ids.add(id),
                    Record::Edge(source, target, _) => {
                        ids.add(source);
                        ids.add(target);
                    }
                    _ => {}
                });
                let original_ids = Arc::new(ids.build());
                let id_map: Arc<dyn PartialIdMap> = original_ids.clone();
                (id_map, Some(original_ids))
            }
        };
        let weighted = records
            .par_iter()
            .any(|record| matches!(record, Record::Edge(_, _, Some(_))));

        let mut builder_config = RelationshipsBuilderConfig::default()
            .with_orientation(config.orientation)
            .with_aggregation(config.aggregation)
            .with_skip_dangling(config.skip_dangling)
            .with_concurrency(config.concurrency)
            .with_buffer_size(config.buffer_size);
        if weighted {
            builder_config = builder_config.with_property(PropertyConfig::new(WEIGHT_PROPERTY).with_default_value(1.0));
        }
        let builder = RelationshipsBuilder::new(id_map, builder_config)?;

        // Step 3. Feed the edges into the builder and compress.
        tracker.begin_sub_task("Build", records.len() as u64);
        let built = records
            .par_iter()
            .try_for_each(|record| match *record {
                Record::Edge(source, target, Some(weight)) if weighted => {
                    builder.add_with_property(source, target, weight)
                }
                Record::Edge(source, target, _) => builder.add(source, target),
                _ => Ok(()),
            })
            .and_then(|_| builder.build_with(termination));
        let relationships = match built {
            Ok(relationships) => relationships,
            Err(error) => {
                tracker.end_sub_task_with_failure("Build");
                return Err(error);
            }
        };
        tracker.log_progress(records.len() as u64);
        tracker.end_sub_task("Build");

        let graph = Self::new(relationships, original_ids);
        if let Some((_, edge_count)) = header {
            let expected = match config.orientation {
                Orientation::Undirected => edge_count * 2,
                _ => edge_count,
            };
            if config.aggregation == Aggregation::None && graph.relationship_count() != expected {
                warn!(
                    expected,
                    actual = graph.relationship_count(),
                    "relationship count differs from the graph header"
                );
            }
        }
        info!(
            nodes = graph.node_count(),
            relationships = graph.relationship_count(),
            weighted,
            "graph loaded"
        );
        Ok(graph)
    }

    /// Builds a graph over `[0, node_count)` from weighted internal-id edges.
    pub fn from_edges(
        node_count: u64,
        edges: &[(u64, u64, f64)],
        orientation: Orientation,
        concurrency: usize,
    ) -> Result<Self> {
        let config = RelationshipsBuilderConfig::default()
            .with_orientation(orientation)
            .with_property(PropertyConfig::new(WEIGHT_PROPERTY))
            .with_concurrency(concurrency);
        let builder = RelationshipsBuilder::new(Arc::new(DirectIdMap::new(node_count)), config)?;
        edges
            .par_iter()
            .try_for_each(|&(source, target, weight)| builder.add_from_internal(source, target, &[weight]))?;
        Ok(Self::new(builder.build()?, None))
    }

    pub fn node_count(&self) -> u64 {
        self.relationships.topology.node_count()
    }

    pub fn relationship_count(&self) -> u64 {
        self.relationships.topology.relationship_count()
    }

    pub fn orientation(&self) -> Orientation {
        self.relationships.topology.orientation()
    }

    pub fn degree(&self, node: u64) -> u64 {
        self.relationships.topology.degree(node)
    }

    pub fn relationships(&self) -> &SingleTypeRelationships {
        &self.relationships
    }

    /// The `weight` property, if the graph has one.
    pub fn weights(&self) -> Option<&RelationshipProperty> {
        self.relationships.property(WEIGHT_PROPERTY).ok()
    }

    pub fn is_weighted(&self) -> bool {
        self.weights().is_some()
    }

    /// Ascending targets of `node`.
    pub fn neighbours(&self, node: u64) -> AdjacencyCursor<'_> {
        self.relationships.topology.cursor(node)
    }

    /// Calls `action(target, weight)` for every relationship of `node`; weight 1 when unweighted.
    pub fn for_each_relationship<F>(&self, node: u64, mut action: F)
    where
        F: FnMut(u64, f64),
    {
        let targets = self.neighbours(node);
        match self.weights() {
            Some(weights) => targets
                .zip(weights.cursor(node))
                .for_each(|(target, weight)| action(target, weight)),
            None => targets.for_each(|target| action(target, 1.0)),
        }
    }

    /// Sum of the relationship weights of `node`.
    pub fn weighted_degree(&self, node: u64) -> f64 {
        let mut degree = 0.0;
        self.for_each_relationship(node, |_, weight| degree += weight);
        degree
    }

    /// Original id of internal node `node`.
    pub fn original_node_id(&self, node: u64) -> i64 {
        self.original_ids
            .as_ref()
            .and_then(|ids| ids.to_original_node_id(node))
            .unwrap_or(node as i64)
    }
}

impl GraphQuery for CompressedGraph {
    /// Retrieves all neighbors of a specified vertex
    ///
    /// # Arguments
    /// * `vertex_id` - Reference to the ID of the vertex whose neighbors we want
    ///
    /// # Returns
    /// * `Vec<u64>` - The ascending neighbor ids, empty if the vertex doesn't exist
    fn read_neighbor(&self, vertex_id: &u64) -> Vec<u64> {
        if !self.has_vertex(vertex_id) {
            return vec![];
        }
        self.neighbours(*vertex_id).collect()
    }

    fn has_vertex(&self, vertex_id: &u64) -> bool {
        *vertex_id < self.node_count()
    }

    /// Checks whether `src_id -> dst_id` exists.
    ///
    /// Targets are sorted, so the scan stops at the first target beyond `dst_id`.
    fn has_edge(&self, src_id: &u64, dst_id: &u64) -> bool {
        if !self.has_vertex(src_id) || !self.has_vertex(dst_id) {
            return false;
        }
        self.neighbours(*src_id)
            .take_while(|target| target <= dst_id)
            .any(|target| target == *dst_id)
    }

    fn vertex_list(&self) -> Vec<u64> {
        (0..self.node_count()).collect()
    }

    fn all(&self) -> BTreeMap<u64, Vec<u64>> {
        (0..self.node_count())
            .map(|vertex_id| (vertex_id, self.read_neighbor(&vertex_id)))
            .collect()
    }
}
