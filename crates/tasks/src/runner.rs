use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::{IncCounterOnDrop, TaskExecutorMetrics};

/// Shortest period a task is scheduled with.
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Work run on a fixed period.
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn period(&self) -> Duration;

    /// Delay before the first run.
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    async fn run(&self);
}

/// Spawns and owns periodic tasks.
#[derive(Debug)]
pub struct TaskRunner {
    shutdown: CancellationToken,
    paused: watch::Sender<bool>,
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    metrics: TaskExecutorMetrics,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl TaskRunner {
    /// A runner whose tasks stop when `shutdown` is cancelled.
    pub fn new(shutdown: CancellationToken) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            shutdown,
            paused,
            handles: Mutex::new(Vec::new()),
            metrics: TaskExecutorMetrics::default(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn `task`. A zero period is raised to [`MIN_PERIOD`].
    pub fn spawn_periodic(&self, task: Arc<dyn PeriodicTask>) {
        let name = task.name();
        let period = if task.period().is_zero() {
            warn!(task = name, min_secs = MIN_PERIOD.as_secs(), "zero period, using minimum");
            MIN_PERIOD
        } else {
            task.period()
        };
        let shutdown = self.shutdown.clone();
        let paused = self.paused.subscribe();
        let metrics = self.metrics.clone();
        metrics.inc_periodic_tasks();

        let handle = tokio::spawn(async move {
            let _finished = IncCounterOnDrop::new(metrics.finished_periodic_tasks_total.clone());
            let start = Instant::now() + task.initial_delay();
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(task = name, period_secs = period.as_secs(), "periodic task started");

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,

                    _ = ticker.tick() => {
                        if *paused.borrow() {
                            trace!(task = name, "runner paused, skipping tick");
                            metrics.inc_skipped();
                            continue;
                        }
                        task.run().await;
                        metrics.inc_runs();
                    }
                }
            }

            debug!(task = name, "periodic task stopped");
        });

        self.handles.lock().push((name, handle));
    }

    /// Skip ticks until [`resume`](Self::resume). A run already in progress finishes.
    pub fn pause(&self) {
        self.paused.send_replace(true);
        debug!("task runner paused");
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
        debug!("task runner resumed");
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Cancel every task and wait for them to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for (name, handle) in handles {
            if let Err(err) = handle.await {
                warn!(task = name, %err, "periodic task ended abnormally");
            }
        }
    }
}
