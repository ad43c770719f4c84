use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{Error, Result};

/// Builds a fixed-size worker pool with `concurrency` threads.
///
/// # Arguments
/// * `concurrency` - Number of worker threads, at least 1
///
/// # Returns
/// * `Ok(ThreadPool)` - The pool; workers are named `quasar-worker-<i>`
/// * `Err(Error)` - On a zero thread count or when the OS refuses to spawn threads
pub fn worker_pool(concurrency: usize) -> Result<ThreadPool> {
    if concurrency < 1 {
        return Err(Error::invalid_config("concurrency", "must be at least 1"));
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .thread_name(|index| format!("quasar-worker-{index}"))
        .build()?;
    Ok(pool)
}
