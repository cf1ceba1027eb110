//! The `query-payment-status` reconciliation task.
//!
//! One lease checks one PENDING transaction against the gateway. While the
//! gateway keeps reporting PENDING the task re-enqueues itself on a
//! backoff that widens with the transaction's age:
//!
//! | pending for | next query in |
//! |-------------|---------------|
//! | < 1 h       | 60 s          |
//! | 1 h to 3 h  | 600 s         |
//! | 3 h to 24 h | 3600 s        |
//!
//! After 24 hours the transaction is marked ABANDONED and the task stops.
//! Only one pending continuation per transaction can exist; the queue
//! dedups on the transaction id.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::task_worker::{TaskHandler, TaskOutcome};
use crate::context::{ContextError, RequestContext};
use crate::entities::TransactionStatus;
use crate::framework::{LeasedTask, MerchantStore, NewTask, StoreError, TaskQueue, TransactionStore};
use crate::payments::query::{PaymentQueryService, QueryError};
use crate::utils::polling_interval::{INITIAL_QUERY_DELAY, next_poll_delay};

pub const TASK_NAME: &str = "query-payment-status";
pub const TASK_VERSION: &str = "1.0";
pub const DEFAULT_POOL: &str = "default";

pub const ABANDONED_DESCRIPTION: &str = "Timed out after 24 hours without final status";

const INITIATOR: &str = "task:query-payment-status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PaymentStatusPayload {
    pub transaction_id: String,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid task payload: {0}")]
    InvalidPayload(String),

    #[error("payment transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("misconfigured: {0}")]
    Misconfigured(#[from] ContextError),

    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Permanent errors fail the task; everything else is retried with
    /// backoff.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ReconcileError::InvalidPayload(_)
                | ReconcileError::TransactionNotFound(_)
                | ReconcileError::Query(QueryError::TransactionNotFound(_))
        )
    }
}

#[derive(Clone)]
pub struct PaymentStatusTask {
    transactions: Arc<dyn TransactionStore>,
    merchants: Arc<dyn MerchantStore>,
    queue: Arc<dyn TaskQueue>,
    query: Arc<dyn PaymentQueryService>,
}

impl PaymentStatusTask {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        merchants: Arc<dyn MerchantStore>,
        queue: Arc<dyn TaskQueue>,
        query: Arc<dyn PaymentQueryService>,
    ) -> Self {
        Self {
            transactions,
            merchants,
            queue,
            query,
        }
    }

    /// First status query for a freshly placed transaction.
    pub fn initial_task(transaction_id: Uuid, now: OffsetDateTime) -> NewTask {
        NewTask {
            name: TASK_NAME.to_string(),
            version: TASK_VERSION.to_string(),
            pool: DEFAULT_POOL.to_string(),
            business_key: transaction_id.to_string(),
            payload: serde_json::json!({ "transactionId": transaction_id.to_string() }),
            due_at: now + INITIAL_QUERY_DELAY,
        }
    }

    pub async fn execute(&self, task: &LeasedTask) -> Result<TaskOutcome, ReconcileError> {
        self.execute_at(task, OffsetDateTime::now_utc()).await
    }

    pub async fn execute_at(
        &self,
        task: &LeasedTask,
        now: OffsetDateTime,
    ) -> Result<TaskOutcome, ReconcileError> {
        let transaction_id = decode_payload(&task.payload)?;

        let mut transaction = self
            .transactions
            .find_transaction(transaction_id)
            .await?
            .ok_or(ReconcileError::TransactionNotFound(transaction_id))?;

        if transaction.status != TransactionStatus::Pending {
            info!(
                transaction_id = %transaction_id,
                status = %transaction.status,
                "Transaction no longer pending, nothing to reconcile"
            );
            return Ok(TaskOutcome::Completed);
        }

        let elapsed = now - transaction.pending_since();
        let Some(delay) = next_poll_delay(elapsed) else {
            transaction.status = TransactionStatus::Abandoned;
            transaction.status_description = Some(ABANDONED_DESCRIPTION.to_string());
            self.transactions.save_transaction(&transaction).await?;
            warn!(
                transaction_id = %transaction_id,
                order_id = %transaction.order_id,
                elapsed_secs = elapsed.whole_seconds(),
                "Transaction abandoned after reconciliation timeout"
            );
            return Ok(TaskOutcome::Abandoned {
                reason: ABANDONED_DESCRIPTION.to_string(),
            });
        };

        let context = RequestContext::for_transaction(&*self.merchants, &transaction, INITIATOR)
            .await
            .inspect_err(|e| {
                error!(transaction_id = %transaction_id, error = %e, "Cannot build merchant context");
            })?;

        let view = self
            .query
            .query_payment_from_gateway(transaction_id, &context)
            .await?;

        if view.status != TransactionStatus::Pending {
            info!(transaction_id = %transaction_id, status = %view.status, "Transaction reconciled");
            return Ok(TaskOutcome::Completed);
        }

        let due_at = now + delay;
        if self.queue.enqueue_unique(task.reschedule_at(due_at)).await? {
            debug!(
                transaction_id = %transaction_id,
                due_at = %due_at,
                delay_secs = delay.whole_seconds(),
                "Status query rescheduled"
            );
        } else {
            info!(transaction_id = %transaction_id, "Status query already scheduled, skipping");
        }
        Ok(TaskOutcome::Rescheduled { due_at })
    }
}

fn decode_payload(payload: &serde_json::Value) -> Result<Uuid, ReconcileError> {
    let payload: PaymentStatusPayload = serde_json::from_value(payload.clone())
        .map_err(|e| ReconcileError::InvalidPayload(e.to_string()))?;
    let raw = payload.transaction_id.trim();
    if raw.is_empty() {
        return Err(ReconcileError::InvalidPayload("transactionId is blank".to_string()));
    }
    Uuid::parse_str(raw)
        .map_err(|e| ReconcileError::InvalidPayload(format!("transactionId {raw:?}: {e}")))
}

#[async_trait]
impl TaskHandler for PaymentStatusTask {
    type Error = ReconcileError;

    fn name(&self) -> &'static str {
        TASK_NAME
    }

    async fn handle(&self, task: &LeasedTask) -> Result<TaskOutcome, ReconcileError> {
        self.execute(task).await
    }

    fn is_permanent(&self, error: &ReconcileError) -> bool {
        error.is_permanent()
    }
}
