//! Engine-wide constants and the YAML-backed engine configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Page shift of the huge paged arrays (2^14 = 16384 elements per page).
pub const PAGE_SHIFT: u32 = 14;

/// Number of elements per page of the huge paged arrays.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Page shift for compressed target pages (256 KiB per page).
pub const TARGET_PAGE_SHIFT: u32 = 18;

/// Page shift for relationship property pages.
pub const PROPERTY_PAGE_SHIFT: u32 = PAGE_SHIFT;

/// Nodes per page of the loading-time adjacency buffer.
pub const BUFFER_PAGE_SHIFT: u32 = 12;

/// Number of deltas packed per block by the compression codec.
pub const BLOCK_SIZE: usize = 64;

/// Batch size used by `BatchQueue::consecutive` when none is given.
pub const DEFAULT_BATCH_SIZE: u64 = 100;

/// Largest batch a queue hands out.
pub const MAX_BATCH_SIZE: u64 = i32::MAX as u64;

/// Relationships buffered by a local builder slot before it flushes.
pub const LOCAL_BUFFER_SIZE: usize = 10_000;

/// Default number of worker threads.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Progress bar template shared by every tracker.
pub const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Engine settings shared by graph construction and algorithm execution.
///
/// Loaded from YAML; absent keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Number of worker threads and builder slots.
    pub concurrency: usize,

    /// Smallest batch handed out by partitioned work queues.
    pub min_batch_size: u64,

    /// Relationships buffered per local builder slot.
    pub local_buffer_size: usize,

    /// Whether progress bars are drawn.
    pub show_progress: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            min_batch_size: 1,
            local_buffer_size: LOCAL_BUFFER_SIZE,
            show_progress: false,
        }
    }
}

impl EngineConfig {
    /// Checks every field and returns the configuration unchanged when valid.
    ///
    /// # Returns
    /// * `Ok(Self)` - When all values are in range
    /// * `Err(Error::InvalidConfiguration)` - Naming the first invalid key
    pub fn validate(self) -> Result<Self> {
        if self.concurrency < 1 {
            return Err(Error::invalid_config("concurrency", "must be at least 1"));
        }
        if self.min_batch_size < 1 {
            return Err(Error::invalid_config("min_batch_size", "must be at least 1"));
        }
        if self.local_buffer_size < 1 {
            return Err(Error::invalid_config("local_buffer_size", "must be at least 1"));
        }
        Ok(self)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()
    }

    /// Reads, parses and validates a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
