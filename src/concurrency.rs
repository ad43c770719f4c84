//! Concurrency primitives shared by graph construction and algorithms.

pub mod termination;
pub mod pool;
pub mod slot_pool;

pub use pool::worker_pool;
pub use slot_pool::{SlotGuard, SlotPool};
pub use termination::{RunningTrue, TerminationFlag, TerminationSignal, RUNNING_TRUE};
