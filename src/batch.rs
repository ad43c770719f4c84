//! Partitioned work queues.
//!
//! A [`BatchQueue`] splits `[0, total)` into disjoint [`Batch`]es that workers claim
//! atomically. Batches come either from consecutive splitting or from a precomputed
//! partition list (for example degree-balanced partitions).

pub mod partition;
pub mod queue;

pub use partition::{batch_size_for, degree_partition, range_partition, Batch};
pub use queue::BatchQueue;
