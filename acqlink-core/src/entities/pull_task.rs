//! PostgreSQL-backed task queue (`pull_tasks` table).

use async_trait::async_trait;
use kanau::processor::Processor;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::framework::{DatabaseProcessor, LeasedTask, NewTask, StoreError, TaskQueue};

/// Queue state of a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "pull_task_status")]
pub enum PullTaskStatus {
    Pending,
    Leased,
    Completed,
    Failed,
}

const RETURNING: &str = "id, name, version, pool, business_key, payload, attempts, due_at, leased_until";

#[derive(Debug, Clone)]
/// Lease the oldest due task in a pool.
///
/// Pending tasks past `due_at` and leased tasks whose lease expired are both
/// candidates. Concurrent leasers skip each other's locked rows.
pub struct LeaseTask {
    pub pool: String,
    pub lease_for: Duration,
}

impl Processor<LeaseTask> for DatabaseProcessor {
    type Output = Option<LeasedTask>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:LeaseTask")]
    async fn process(&self, lease: LeaseTask) -> Result<Option<LeasedTask>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE pull_tasks SET
                status = $3,
                leased_until = now() + make_interval(secs => $2),
                attempts = attempts + 1,
                updated_at = now()
            WHERE id = (
                SELECT id FROM pull_tasks
                WHERE pool = $1
                  AND ((status = $4 AND due_at <= now())
                    OR (status = $3 AND leased_until < now()))
                ORDER BY due_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {RETURNING}
            "#
        );
        sqlx::query_as::<_, LeasedTask>(&sql)
            .bind(lease.pool)
            .bind(lease.lease_for.as_seconds_f64())
            .bind(PullTaskStatus::Leased)
            .bind(PullTaskStatus::Pending)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Insert a pending task unless one with the same name and business key is
/// already pending. Outputs `false` on a dedup hit.
pub struct InsertTaskUnique {
    pub task: NewTask,
}

impl Processor<InsertTaskUnique> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertTaskUnique")]
    async fn process(&self, insert: InsertTaskUnique) -> Result<bool, sqlx::Error> {
        let task = insert.task;
        let result = sqlx::query(
            r#"
            INSERT INTO pull_tasks (name, version, pool, business_key, payload, status, due_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (name, business_key) WHERE status = 'pending' DO NOTHING
            "#,
        )
        .bind(task.name)
        .bind(task.version)
        .bind(task.pool)
        .bind(task.business_key)
        .bind(task.payload)
        .bind(PullTaskStatus::Pending)
        .bind(task.due_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Put a leased task back to pending with a new due time.
pub struct RescheduleTask {
    pub id: Uuid,
    pub due_at: OffsetDateTime,
    pub reason: String,
}

impl Processor<RescheduleTask> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RescheduleTask")]
    async fn process(&self, update: RescheduleTask) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pull_tasks SET
                status = $2,
                due_at = $3,
                leased_until = NULL,
                last_error = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(update.id)
        .bind(PullTaskStatus::Pending)
        .bind(update.due_at)
        .bind(update.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Move a task to a final state. `reason` only overwrites `last_error` when
/// given.
pub struct FinishTask {
    pub id: Uuid,
    pub status: PullTaskStatus,
    pub reason: Option<String>,
}

impl Processor<FinishTask> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FinishTask")]
    async fn process(&self, update: FinishTask) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE pull_tasks SET
                status = $2,
                leased_until = NULL,
                last_error = COALESCE($3, last_error),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(update.id)
        .bind(update.status)
        .bind(update.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for DatabaseProcessor {
    async fn lease(&self, pool: &str, lease_for: Duration) -> Result<Option<LeasedTask>, StoreError> {
        Ok(self
            .process(LeaseTask {
                pool: pool.to_string(),
                lease_for,
            })
            .await?)
    }

    async fn enqueue_unique(&self, task: NewTask) -> Result<bool, StoreError> {
        Ok(self.process(InsertTaskUnique { task }).await?)
    }

    async fn complete(&self, task: &LeasedTask) -> Result<(), StoreError> {
        Ok(self
            .process(FinishTask {
                id: task.id,
                status: PullTaskStatus::Completed,
                reason: None,
            })
            .await?)
    }

    async fn retry_later(
        &self,
        task: &LeasedTask,
        reason: &str,
        due_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        Ok(self
            .process(RescheduleTask {
                id: task.id,
                due_at,
                reason: reason.to_string(),
            })
            .await?)
    }

    async fn fail_permanently(&self, task: &LeasedTask, reason: &str) -> Result<(), StoreError> {
        Ok(self
            .process(FinishTask {
                id: task.id,
                status: PullTaskStatus::Failed,
                reason: Some(reason.to_string()),
            })
            .await?)
    }
}
