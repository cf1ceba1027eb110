//! Bounded worker pool draining one queue pool.
//!
//! The worker leases due tasks until the queue is empty or `max_workers`
//! leases are in flight, runs each lease on its own tokio task, and settles
//! the lease with the queue according to the handler's outcome:
//!
//! - `Completed` / `Rescheduled` -> `complete`
//! - `Abandoned` or a permanent error -> `fail_permanently`
//! - any other error -> `retry_later` after `2^attempts` seconds (capped)

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigStore, WorkerConfig};
use crate::framework::{LeasedTask, StoreError, TaskQueue};
use crate::utils::polling_interval::retry_delay;

/// What a successful lease decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Nothing left to do for this task.
    Completed,
    /// A continuation was scheduled for `due_at`.
    Rescheduled { due_at: OffsetDateTime },
    /// The business flow gave up; recorded as a failed task.
    Abandoned { reason: String },
}

#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn handle(&self, task: &LeasedTask) -> Result<TaskOutcome, Self::Error>;

    /// Permanent errors are not retried.
    fn is_permanent(&self, error: &Self::Error) -> bool;
}

/// How a lease was settled with the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Failed { reason: String },
    Retrying { due_at: OffsetDateTime },
}

pub struct TaskWorker<H> {
    queue: Arc<dyn TaskQueue>,
    handler: Arc<H>,
}

impl<H: TaskHandler> TaskWorker<H> {
    pub fn new(queue: Arc<dyn TaskQueue>, handler: Arc<H>) -> Self {
        Self { queue, handler }
    }

    /// Run until shutdown is signaled, then wait for in-flight leases.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, config: ConfigStore<WorkerConfig>) {
        let mut config_watcher = config.subscribe();
        let mut in_flight: JoinSet<()> = JoinSet::new();
        info!(task = self.handler.name(), "TaskWorker started");

        loop {
            let settings = config.snapshot().await;
            self.fill(&mut in_flight, &settings).await;

            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!(task = self.handler.name(), "TaskWorker received shutdown signal");
                        break;
                    }
                }

                Ok(()) = config_watcher.changed() => {
                    info!(task = self.handler.name(), "TaskWorker config reloaded");
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Lease task panicked or was aborted");
                    }
                }

                _ = tokio::time::sleep(settings.poll_interval) => {}
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Lease task panicked or was aborted");
            }
        }
        info!(task = self.handler.name(), "TaskWorker shutdown complete");
    }

    /// Lease until the pool is drained or the concurrency cap is reached.
    async fn fill(&self, in_flight: &mut JoinSet<()>, settings: &WorkerConfig) {
        while in_flight.len() < settings.max_workers {
            match self.queue.lease(&settings.pool, settings.lease_for()).await {
                Ok(Some(task)) => {
                    let queue = Arc::clone(&self.queue);
                    let handler = Arc::clone(&self.handler);
                    in_flight.spawn(async move {
                        let _ = process_lease(queue.as_ref(), handler.as_ref(), task).await;
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    error!(pool = %settings.pool, error = %e, "Failed to lease task");
                    break;
                }
            }
        }
    }

    /// Lease and process one task inline. `None` when nothing is due.
    pub async fn process_next(&self, settings: &WorkerConfig) -> Result<Option<Settlement>, StoreError> {
        let Some(task) = self.queue.lease(&settings.pool, settings.lease_for()).await? else {
            return Ok(None);
        };
        process_lease(self.queue.as_ref(), self.handler.as_ref(), task)
            .await
            .map(Some)
    }
}

async fn process_lease<H: TaskHandler>(
    queue: &dyn TaskQueue,
    handler: &H,
    task: LeasedTask,
) -> Result<Settlement, StoreError> {
    debug!(task_id = %task.id, business_key = %task.business_key, attempts = task.attempts, "Processing lease");
    let result = handler.handle(&task).await;
    let settled = settle(queue, handler, &task, result, OffsetDateTime::now_utc()).await;
    if let Err(e) = &settled {
        error!(task_id = %task.id, business_key = %task.business_key, error = %e, "Failed to settle lease");
    }
    settled
}

async fn settle<H: TaskHandler>(
    queue: &dyn TaskQueue,
    handler: &H,
    task: &LeasedTask,
    result: Result<TaskOutcome, H::Error>,
    now: OffsetDateTime,
) -> Result<Settlement, StoreError> {
    match result {
        Ok(TaskOutcome::Completed) => {
            queue.complete(task).await?;
            Ok(Settlement::Completed)
        }
        Ok(TaskOutcome::Rescheduled { due_at }) => {
            debug!(task_id = %task.id, business_key = %task.business_key, due_at = %due_at, "Lease completed with continuation");
            queue.complete(task).await?;
            Ok(Settlement::Completed)
        }
        Ok(TaskOutcome::Abandoned { reason }) => {
            warn!(task_id = %task.id, business_key = %task.business_key, reason = %reason, "Task abandoned");
            queue.fail_permanently(task, &reason).await?;
            Ok(Settlement::Failed { reason })
        }
        Err(e) if handler.is_permanent(&e) => {
            let reason = e.to_string();
            error!(task_id = %task.id, business_key = %task.business_key, error = %reason, "Task failed permanently");
            queue.fail_permanently(task, &reason).await?;
            Ok(Settlement::Failed { reason })
        }
        Err(e) => {
            let reason = e.to_string();
            let attempts = u32::try_from(task.attempts).unwrap_or(0);
            let due_at = now + retry_delay(attempts);
            error!(
                task_id = %task.id,
                business_key = %task.business_key,
                attempts,
                retry_at = %due_at,
                error = %reason,
                "Task failed, will retry"
            );
            queue.retry_later(task, &reason, due_at).await?;
            Ok(Settlement::Retrying { due_at })
        }
    }
}
