use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::PROGRESS_TEMPLATE;
use crate::progress::task::Task;

/// Receives progress events from a running computation.
///
/// Implementations must tolerate `log_progress` calls from many workers at once.
pub trait ProgressTracker: Send + Sync {
    /// Starts a phase with `volume` units of work (0 when unknown).
    fn begin_sub_task(&self, description: &str, volume: u64);

    /// Reports `delta` finished units of the current phase.
    fn log_progress(&self, delta: u64);

    /// Emits a free form message attached to the current phase.
    fn log_message(&self, message: &str);

    /// Ends the current phase.
    fn end_sub_task(&self, description: &str);

    /// Ends the current phase after a failure or termination.
    fn end_sub_task_with_failure(&self, description: &str);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProgressTracker;

impl ProgressTracker for EmptyProgressTracker {
    fn begin_sub_task(&self, _description: &str, _volume: u64) {}

    fn log_progress(&self, _delta: u64) {}

    fn log_message(&self, _message: &str) {}

    fn end_sub_task(&self, _description: &str) {}

    fn end_sub_task_with_failure(&self, _description: &str) {}
}

struct Phase {
    description: String,
    started: Instant,
    bar: Option<ProgressBar>,
}

/// Logs phase boundaries through `tracing` and optionally draws an `indicatif` bar.
pub struct TaskProgressTracker {
    root: Task,
    show_bar: bool,
    phases: Mutex<Vec<Phase>>,
    progress: AtomicU64,
}

impl TaskProgressTracker {
    /// # Arguments
    /// * `root` - The task tree of the computation, used for naming log lines
    /// * `show_bar` - Whether each phase draws a progress bar on stderr
    pub fn new(root: Task, show_bar: bool) -> Self {
        Self {
            root,
            show_bar,
            phases: Mutex::new(Vec::new()),
            progress: AtomicU64::new(0),
        }
    }

    /// Units of work reported since construction.
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Number of phases currently open.
    pub fn depth(&self) -> usize {
        self.lock_phases().len()
    }

    fn lock_phases(&self) -> std::sync::MutexGuard<'_, Vec<Phase>> {
        self.phases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn new_bar(&self, description: &str, volume: u64) -> Option<ProgressBar> {
        if !self.show_bar {
            return None;
        }
        let bar = ProgressBar::new(volume);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(format!("{} :: {}", self.root.description(), description));
        Some(bar)
    }

    fn end(&self, description: &str, failed: bool) {
        let phase = self.lock_phases().pop();
        let Some(phase) = phase else {
            warn!(task = description, "progress phase ended without being started");
            return;
        };
        if phase.description != description {
            warn!(
                expected = phase.description.as_str(),
                actual = description,
                "progress phases ended out of order"
            );
        }
        let elapsed = phase.started.elapsed();
        if let Some(bar) = phase.bar {
            bar.finish_and_clear();
        }
        if failed {
            warn!(
                "{} :: {} :: Failed after {:?} ms",
                self.root.description(),
                description,
                elapsed.as_millis()
            );
        } else {
            info!(
                "{} :: {} :: Finished in {:?} ms",
                self.root.description(),
                description,
                elapsed.as_millis()
            );
        }
    }
}

impl ProgressTracker for TaskProgressTracker {
    fn begin_sub_task(&self, description: &str, volume: u64) {
        info!("{} :: {} :: Start", self.root.description(), description);
        let bar = self.new_bar(description, volume);
        self.lock_phases().push(Phase {
            description: description.to_string(),
            started: Instant::now(),
            bar,
        });
    }

    fn log_progress(&self, delta: u64) {
        self.progress.fetch_add(delta, Ordering::Relaxed);
        if self.show_bar {
            if let Some(bar) = self.lock_phases().last().and_then(|phase| phase.bar.as_ref()) {
                bar.inc(delta);
            }
        }
    }

    fn log_message(&self, message: &str) {
        info!("{} :: {}", self.root.description(), message);
    }

    fn end_sub_task(&self, description: &str) {
        self.end(description, false);
    }

    fn end_sub_task_with_failure(&self, description: &str) {
        self.end(description, true);
    }
}
