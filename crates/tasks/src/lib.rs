//! Periodic task runner.
//!
//! [`TaskRunner`] drives [`PeriodicTask`]s on tokio intervals. Ticks are
//! skipped while the runner is paused, and every task stops when the shared
//! [`CancellationToken`] fires.

mod metrics;
mod runner;

pub use metrics::{IncCounterOnDrop, TaskExecutorMetrics};
pub use runner::{MIN_PERIOD, PeriodicTask, TaskRunner};
pub use tokio_util::sync::CancellationToken;
