//! Progress reporting for long running construction and algorithm phases.
//!
//! An algorithm describes its phases up front as a [`Task`] tree; a [`ProgressTracker`]
//! receives begin/progress/end events while the phases run.

pub mod task;
pub mod tracker;

pub use task::{Task, Tasks};
pub use tracker::{EmptyProgressTracker, ProgressTracker, TaskProgressTracker};
