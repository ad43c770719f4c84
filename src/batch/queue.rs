use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use rayon::ThreadPool;
use tracing::debug;

use crate::batch::partition::{batch_size_for, Batch};
use crate::concurrency::{worker_pool, TerminationFlag};
use crate::config::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::util::ceil_div;

enum Source {
    Consecutive { total: u64, batch_size: u64 },
    Partitions(Vec<Batch>),
}

/// A queue of disjoint batches claimed atomically by workers.
pub struct BatchQueue {
    source: Source,
    next: AtomicU64,
}

impl BatchQueue {
    /// Splits `[0, total)` into batches of [`DEFAULT_BATCH_SIZE`].
    pub fn consecutive(total: u64) -> Self {
        Self::with_batch_size(total, DEFAULT_BATCH_SIZE)
    }

    /// Splits `[0, total)` for `concurrency` workers.
    ///
    /// The batch size is `max(min_batch_size, ceil(total / concurrency))` capped at
    /// `i32::MAX`; the last batch takes the remainder.
    pub fn consecutive_with(total: u64, min_batch_size: u64, concurrency: usize) -> Self {
        Self::with_batch_size(total, batch_size_for(total, min_batch_size, concurrency))
    }

    fn with_batch_size(total: u64, batch_size: u64) -> Self {
        Self {
            source: Source::Consecutive {
                total,
                batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            },
            next: AtomicU64::new(0),
        }
    }

    /// Hands out precomputed partitions in order.
    pub fn from_partitions(partitions: Vec<Batch>) -> Self {
        Self {
            source: Source::Partitions(partitions),
            next: AtomicU64::new(0),
        }
    }

    /// Number of batches the queue hands out in total.
    pub fn batch_count(&self) -> u64 {
        match &self.source {
            Source::Consecutive { total, batch_size } => ceil_div(*total, *batch_size),
            Source::Partitions(partitions) => partitions.len() as u64,
        }
    }

    /// Claims the next batch, or `None` once the queue is exhausted.
    pub fn pop(&self) -> Option<Batch> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        match &self.source {
            Source::Consecutive { total, batch_size } => {
                let start = index.checked_mul(*batch_size)?;
                (start < *total).then(|| Batch::new(start, (*batch_size).min(total - start)))
            }
            Source::Partitions(partitions) => partitions.get(index as usize).copied(),
        }
    }

    /// Consumes the queue on a fresh pool of `concurrency` workers.
    ///
    /// See [`BatchQueue::parallel_consume_in`].
    pub fn parallel_consume<F>(
        &self,
        concurrency: usize,
        termination: &dyn TerminationFlag,
        action: F,
    ) -> Result<()>
    where
        F: Fn(Batch) -> Result<()> + Sync,
    {
        let pool = worker_pool(concurrency)?;
        self.parallel_consume_in(&pool, concurrency, termination, action)
    }

    /// Consumes the queue with `concurrency` workers spawned on `pool`.
    ///
    /// Every worker checks `termination` before claiming a batch. Once the flag is
    /// lowered no new batch starts, running batches finish and the call fails with
    /// [`Error::Terminated`]. The first error returned by `action` stops the remaining
    /// work and is returned as is.
    pub fn parallel_consume_in<F>(
        &self,
        pool: &ThreadPool,
        concurrency: usize,
        termination: &dyn TerminationFlag,
        action: F,
    ) -> Result<()>
    where
        F: Fn(Batch) -> Result<()> + Sync,
    {
        let abort = AtomicBool::new(false);
        let first_error = Mutex::new(None::<Error>);
        let record = |error: Error| {
            abort.store(true, Ordering::Release);
            let mut slot = first_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.get_or_insert(error);
        };

        pool.scope(|scope| {
            for worker in 0..concurrency.max(1) {
                let action = &action;
                let record = &record;
                let abort = &abort;
                scope.spawn(move |_| {
                    let mut consumed = 0u64;
                    while !abort.load(Ordering::Acquire) {
                        if !termination.running() {
                            record(Error::Terminated);
                            break;
                        }
                        let Some(batch) = self.pop() else {
                            break;
                        };
                        if let Err(error) = action(batch) {
                            record(error);
                            break;
                        }
                        consumed += 1;
                    }
                    debug!(worker, consumed, "batch worker finished");
                });
            }
        });

        let error = first_error
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test_queue {
    use std::sync::atomic::AtomicU64;

    use crate::concurrency::{TerminationSignal, RUNNING_TRUE};

    use super::*;

    fn drain_sizes(queue: &BatchQueue) -> Vec<u64> {
        std::iter::from_fn(|| queue.pop()).map(|batch| batch.size()).collect()
    }

    #[test]
    fn test_default_batch_size() {
        let queue = BatchQueue::consecutive(250);
        assert_eq!(drain_sizes(&queue), vec![100, 100, 50]);
    }

    #[test]
    fn test_consecutive_with_concurrency() {
        assert_eq!(drain_sizes(&BatchQueue::consecutive_with(101, 1, 4)), vec![26, 26, 26, 23]);
        assert_eq!(drain_sizes(&BatchQueue::consecutive_with(100, 100, 4)), vec![100]);
        assert_eq!(drain_sizes(&BatchQueue::consecutive_with(100, 200, 4)), vec![100]);
    }

    /// Batches never exceed `i32::MAX` elements.
    #[test]
    fn test_batch_size_capped() {
        let max = i32::MAX as u64;
        let queue = BatchQueue::consecutive_with(5 * max, 1, 4);
        assert_eq!(queue.batch_count(), 5);
        assert_eq!(drain_sizes(&queue), vec![max; 5]);
    }

    #[test]
    fn test_empty_queue() {
        let queue = BatchQueue::consecutive_with(0, 1, 4);
        assert_eq!(queue.batch_count(), 0);
        assert!(queue.pop().is_none());
    }

    /// Every element is consumed exactly once.
    #[test]
    fn test_parallel_consume_sum() {
        let total = 100_001_001u64;
        let queue = BatchQueue::consecutive_with(total, 1, 4);
        let sum = AtomicU64::new(0);
        queue
            .parallel_consume(4, &RUNNING_TRUE, |batch| {
                sum.fetch_add(batch.size(), Ordering::Relaxed);
                Ok(())
            })
            .unwrap();
        assert_eq!(sum.load(Ordering::Relaxed), total);
    }

    #[test]
    fn test_terminated_before_start() {
        let queue = BatchQueue::consecutive(1000);
        let touched = AtomicU64::new(0);
        let error = queue
            .parallel_consume(4, &TerminationSignal::terminated(), |_| {
                touched.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap_err();
        assert_eq!(error.to_string(), "The execution has been terminated.");
        assert_eq!(touched.load(Ordering::Relaxed), 0);
    }

    /// A flag lowered part-way through stops the remaining batches.
    #[test]
    fn test_terminated_while_consuming() {
        let queue = BatchQueue::consecutive(10_000);
        let signal = TerminationSignal::new();
        let consumed = AtomicU64::new(0);
        let error = queue
            .parallel_consume(4, &signal, |_| {
                if consumed.fetch_add(1, Ordering::AcqRel) + 1 == 10 {
                    signal.terminate();
                }
                Ok(())
            })
            .unwrap_err();
        assert!(error.is_terminated());
        let consumed = consumed.load(Ordering::Acquire);
        assert!(consumed >= 10);
        assert!(consumed < queue.batch_count());
    }

    #[test]
    fn test_action_error_is_returned() {
        let queue = BatchQueue::consecutive(1000);
        let error = queue
            .parallel_consume(2, &RUNNING_TRUE, |batch| {
                if batch.start() == 500 {
                    Err(Error::NodeOutOfRange { node_id: 500, node_count: 0 })
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert!(matches!(error, Error::NodeOutOfRange { node_id: 500, .. }));
    }

    #[test]
    fn test_partitions_are_handed_out_in_order() {
        let queue = BatchQueue::from_partitions(vec![Batch::new(0, 3), Batch::new(3, 1)]);
        assert_eq!(queue.pop(), Some(Batch::new(0, 3)));
        assert_eq!(queue.pop(), Some(Batch::new(3, 1)));
        assert_eq!(queue.pop(), None);
    }
}
