//! Task Runner Metrics

use core::fmt;
use metrics::Counter;

/// Task Runner Metrics
#[derive(Clone, Debug)]
pub struct TaskExecutorMetrics {
    /// Number of spawned periodic tasks
    pub(crate) periodic_tasks_total: Counter,
    /// Number of periodic tasks that stopped
    pub(crate) finished_periodic_tasks_total: Counter,
    /// Number of completed task runs
    pub(crate) task_runs_total: Counter,
    /// Number of ticks skipped while paused
    pub(crate) skipped_runs_total: Counter,
}

impl Default for TaskExecutorMetrics {
    fn default() -> Self {
        Self {
            periodic_tasks_total: metrics::counter!("executor.spawn.periodic_tasks_total"),
            finished_periodic_tasks_total: metrics::counter!(
                "executor.spawn.finished_periodic_tasks_total"
            ),
            task_runs_total: metrics::counter!("executor.periodic.runs_total"),
            skipped_runs_total: metrics::counter!("executor.periodic.skipped_runs_total"),
        }
    }
}

impl TaskExecutorMetrics {
    /// Increments the counter for spawned periodic tasks.
    pub(crate) fn inc_periodic_tasks(&self) {
        self.periodic_tasks_total.increment(1);
    }

    pub(crate) fn inc_runs(&self) {
        self.task_runs_total.increment(1);
    }

    pub(crate) fn inc_skipped(&self) {
        self.skipped_runs_total.increment(1);
    }
}

/// Helper type for increasing counters even if a task fails
pub struct IncCounterOnDrop(Counter);

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    /// Creates a new instance of `IncCounterOnDrop` with the given counter.
    pub const fn new(counter: Counter) -> Self {
        Self(counter)
    }
}

impl Drop for IncCounterOnDrop {
    /// Increment the counter when the instance is dropped.
    fn drop(&mut self) {
        self.0.increment(1);
    }
}
