use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Cooperative cancellation signal polled at batch boundaries.
pub trait TerminationFlag: Sync {
    /// Returns `false` once the computation should stop.
    fn running(&self) -> bool;

    /// Fails with [`Error::Terminated`] once the flag has been lowered.
    fn assert_running(&self) -> Result<()> {
        if self.running() {
            Ok(())
        } else {
            Err(Error::Terminated)
        }
    }
}

/// A flag that never terminates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningTrue;

pub const RUNNING_TRUE: RunningTrue = RunningTrue;

impl TerminationFlag for RunningTrue {
    fn running(&self) -> bool {
        true
    }
}

/// A flag that can be lowered from any thread holding a clone.
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    terminated: Arc<AtomicBool>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that has already been raised; every check fails immediately.
    pub fn terminated() -> Self {
        let signal = Self::new();
        signal.terminate();
        signal
    }

    /// Requests termination. Running batches finish, no new batch starts.
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl TerminationFlag for TerminationSignal {
    fn running(&self) -> bool {
        !self.is_terminated()
    }
}
