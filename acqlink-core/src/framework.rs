//! Collaborator contracts and the PostgreSQL processor implementing them.
//!
//! The reconciliation core only talks to persistence through the traits in
//! this module. [`DatabaseProcessor`] implements all of them by sending
//! query messages to itself; each message and its SQL live next to the
//! entity in [`crate::entities`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::entities::merchant::Merchant;
use crate::entities::payment_transaction::PaymentTransaction;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Optimistic version check failed; someone else saved first.
    #[error("concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: Uuid },
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn find_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>, StoreError>;

    async fn find_transaction_by_order(
        &self,
        merchant_id: Uuid,
        order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError>;

    /// Durably write the mutable columns, checking `version`. Returns the
    /// stored row with its new version.
    async fn save_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError>;
}

#[async_trait]
pub trait MerchantStore: Send + Sync {
    async fn find_merchant(&self, id: Uuid) -> Result<Option<Merchant>, StoreError>;

    /// Look a merchant up by either its test or live gateway MID.
    async fn find_merchant_by_gateway_mid(&self, mid: &str) -> Result<Option<Merchant>, StoreError>;

    /// Returns `true` when the stored balance actually changed.
    async fn update_merchant_balance(&self, id: Uuid, balance: Decimal) -> Result<bool, StoreError>;
}

/// A task to put on the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub name: String,
    pub version: String,
    pub pool: String,
    /// At most one pending task exists per `(name, business_key)`.
    pub business_key: String,
    pub payload: serde_json::Value,
    pub due_at: OffsetDateTime,
}

/// A task leased by one worker.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct LeasedTask {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub pool: String,
    pub business_key: String,
    pub payload: serde_json::Value,
    /// Number of times this task has been leased, including this one.
    pub attempts: i32,
    pub due_at: OffsetDateTime,
    pub leased_until: Option<OffsetDateTime>,
}

impl LeasedTask {
    /// Continuation of this task: same name, version, pool, key and payload.
    pub fn reschedule_at(&self, due_at: OffsetDateTime) -> NewTask {
        NewTask {
            name: self.name.clone(),
            version: self.version.clone(),
            pool: self.pool.clone(),
            business_key: self.business_key.clone(),
            payload: self.payload.clone(),
            due_at,
        }
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Lease the oldest due task in `pool`, or one whose lease expired.
    async fn lease(&self, pool: &str, lease_for: Duration) -> Result<Option<LeasedTask>, StoreError>;

    /// Enqueue unless a pending task with the same name and business key
    /// exists. Returns `false` on a dedup hit.
    async fn enqueue_unique(&self, task: NewTask) -> Result<bool, StoreError>;

    async fn complete(&self, task: &LeasedTask) -> Result<(), StoreError>;

    async fn retry_later(
        &self,
        task: &LeasedTask,
        reason: &str,
        due_at: OffsetDateTime,
    ) -> Result<(), StoreError>;

    async fn fail_permanently(&self, task: &LeasedTask, reason: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::merchant::{GetMerchantByGatewayMid, GetMerchantById, UpdateMerchantBalance};
    use crate::entities::payment_transaction::{
        GetTransactionById, GetTransactionByOrder, UpdateTransactionChecked,
    };
    use crate::entities::pull_task::{FinishTask, InsertTaskUnique, LeaseTask, RescheduleTask};
    use kanau::processor::Processor;

    fn handles<M: Send>()
    where
        DatabaseProcessor: Processor<M, Error = sqlx::Error>,
    {
    }

    fn stores<T: TransactionStore + MerchantStore + TaskQueue>() {}

    #[test]
    fn every_query_is_a_database_message() {
        handles::<GetTransactionById>();
        handles::<GetTransactionByOrder>();
        handles::<UpdateTransactionChecked>();
        handles::<GetMerchantById>();
        handles::<GetMerchantByGatewayMid>();
        handles::<UpdateMerchantBalance>();
        handles::<LeaseTask>();
        handles::<InsertTaskUnique>();
        handles::<RescheduleTask>();
        handles::<FinishTask>();
        stores::<DatabaseProcessor>();
    }

    #[test]
    fn store_errors_wrap_sqlx_errors() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.to_string().starts_with("database error"));
    }
}
