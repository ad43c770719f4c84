/// A node of the progress task tree.
///
/// Leaves carry a volume (units of work reported through
/// [`ProgressTracker::log_progress`](crate::progress::ProgressTracker::log_progress));
/// inner tasks group their children. Iterative tasks repeat their children up to
/// `max_iterations` times.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    description: String,
    volume: u64,
    max_iterations: Option<usize>,
    sub_tasks: Vec<Task>,
}

impl Task {
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sub_tasks(&self) -> &[Task] {
        &self.sub_tasks
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// Units of work of this task including all children and iterations.
    pub fn total_volume(&self) -> u64 {
        let children: u64 = self.sub_tasks.iter().map(Task::total_volume).sum();
        let repeats = self.max_iterations.unwrap_or(1) as u64;
        self.volume + children * repeats
    }

    /// Finds a direct child by description.
    pub fn sub_task(&self, description: &str) -> Option<&Task> {
        self.sub_tasks
            .iter()
            .find(|task| task.description == description)
    }
}

/// Factory functions for building task trees.
pub struct Tasks;

impl Tasks {
    /// A leaf task with `volume` units of work.
    pub fn leaf(description: impl Into<String>, volume: u64) -> Task {
        Task {
            description: description.into(),
            volume,
            max_iterations: None,
            sub_tasks: Vec::new(),
        }
    }

    /// A task made of the given children, run once each.
    pub fn task(description: impl Into<String>, sub_tasks: Vec<Task>) -> Task {
        Task {
            description: description.into(),
            volume: 0,
            max_iterations: None,
            sub_tasks,
        }
    }

    /// A task whose children repeat up to `max_iterations` times.
    pub fn iterative(
        description: impl Into<String>,
        max_iterations: usize,
        sub_tasks: Vec<Task>,
    ) -> Task {
        Task {
            description: description.into(),
            volume: 0,
            max_iterations: Some(max_iterations),
            sub_tasks,
        }
    }
}
