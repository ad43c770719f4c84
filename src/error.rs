//! Error types shared by every component of the engine.
//!
//! Configuration errors, data errors, resource exhaustion and cancellation are kept
//! apart so that callers can tell an invalid input from a terminated run.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by graph construction and algorithm execution.
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration value is out of its valid domain.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfiguration {
        /// Name of the offending configuration key.
        key: String,
        /// Why the value was rejected.
        message: String,
    },

    /// `NONE` aggregation was mixed with folding aggregations across properties.
    #[error("Conflicting relationship property aggregations: {0}")]
    AggregationMismatch(String),

    /// A property array does not have the expected number of values.
    #[error(
        "All property arrays for relationship property '{key}' should have the same number \
         of dimensions: expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        /// Property key whose values are inconsistent.
        key: String,
        /// Expected number of values.
        expected: usize,
        /// Actual number of values.
        actual: usize,
    },

    /// One or both endpoints of a relationship are missing from the id map.
    #[error("The following node ids are not present in the node id space: {}", join_ids(.0))]
    UnmappedNodeId(Vec<i64>),

    /// A numeric input value is not usable (NaN or infinite).
    #[error("Invalid value {value} for relationship property '{key}'")]
    InvalidPropertyValue {
        /// Property key.
        key: String,
        /// Rejected value.
        value: f64,
    },

    /// An internal node id outside `[0, node_count)` was used.
    #[error("Node id {node_id} is out of range for a graph with {node_count} nodes")]
    NodeOutOfRange {
        /// Offending node id.
        node_id: u64,
        /// Node count of the graph.
        node_count: u64,
    },

    /// The requested relationship property is not part of the graph.
    #[error("Relationship property '{0}' does not exist")]
    PropertyNotFound(String),

    /// A page or buffer could not be allocated.
    #[error("Failed to allocate {bytes} bytes")]
    AllocationFailed {
        /// Requested size in bytes.
        bytes: usize,
    },

    /// The termination flag was raised while the computation was running.
    #[error("The execution has been terminated.")]
    Terminated,

    /// Relationships were added after the builder was closed.
    #[error("The relationships builder has already been closed")]
    BuilderClosed,

    /// `build()` was called more than once.
    #[error("The relationships builder has already been built")]
    AlreadyBuilt,

    /// No algorithm is registered under the requested name.
    #[error("Unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// The algorithm received a configuration of another algorithm.
    #[error("Algorithm '{algorithm}' cannot run with a '{config}' configuration")]
    ConfigurationKind {
        /// Algorithm that was dispatched.
        algorithm: String,
        /// Kind of the supplied configuration.
        config: String,
    },

    /// The worker thread pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error while reading a graph or configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A graph file line could not be parsed.
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// YAML configuration could not be decoded.
    #[error("Configuration error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Result serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`].
    pub fn invalid_config(key: &str, message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors that describe a cancelled run rather than a failure.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Error::Terminated)
    }

    /// Returns `true` for configuration errors raised before any work started.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration { .. }
                | Error::AggregationMismatch(_)
                | Error::ConfigurationKind { .. }
        )
    }
}

fn join_ids(ids: &[i64]) -> String {
    crate::util::join(ids.iter())
}
