pub mod config;
pub mod error;
pub mod util;
pub mod paged;
pub mod concurrency;
pub mod progress;
pub mod batch;
pub mod compress;
pub mod adjacency;
pub mod loading;
pub mod types;
pub mod dss;
pub mod algorithms;

pub use error::{Error, Result};
