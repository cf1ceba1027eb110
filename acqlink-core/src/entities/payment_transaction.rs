use async_trait::async_trait;
use kanau::processor::Processor;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::entities::{Environment, PaymentBrand, TransactionStatus};
use crate::framework::{DatabaseProcessor, StoreError, TransactionStore};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub merchant_id: Option<Uuid>,
    /// Order id shared with the gateway.
    pub order_id: String,
    pub client_id: Option<String>,
    pub status: TransactionStatus,
    pub status_description: Option<String>,
    /// Pinned environment; falls back to the merchant's mode when unset.
    pub environment: Option<Environment>,
    pub payment_brand: Option<PaymentBrand>,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub currency: String,
    pub reply_url: Option<String>,
    pub backoffice_url: Option<String>,
    /// When the placement was sent to the gateway.
    pub request_timestamp: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub request_data: Option<String>,
    pub initial_response_data: Option<String>,
    pub last_query_data: Option<String>,
    pub callback_data: Option<String>,
    pub callback_timestamp: Option<OffsetDateTime>,
    pub version: i32,
}

impl PaymentTransaction {
    /// Start of the reconciliation clock.
    pub fn pending_since(&self) -> OffsetDateTime {
        self.request_timestamp.unwrap_or(self.created_at)
    }

    pub fn belongs_to(&self, merchant_id: Uuid) -> bool {
        self.merchant_id == Some(merchant_id)
    }
}

/// Read-only projection handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionView {
    pub id: Uuid,
    pub order_id: String,
    pub status: TransactionStatus,
    pub status_description: Option<String>,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub currency: String,
}

impl From<&PaymentTransaction> for TransactionView {
    fn from(value: &PaymentTransaction) -> Self {
        Self {
            id: value.id,
            order_id: value.order_id.clone(),
            status: value.status,
            status_description: value.status_description.clone(),
            amount: value.amount,
            balance: value.balance,
            currency: value.currency.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    id, merchant_id, order_id, client_id, status, status_description,
    environment, payment_brand, amount, balance, currency, reply_url,
    backoffice_url, request_timestamp, created_at, request_data,
    initial_response_data, last_query_data, callback_data,
    callback_timestamp, version
"#;

#[derive(Debug, Clone)]
pub struct GetTransactionById {
    pub id: Uuid,
}

impl Processor<GetTransactionById> for DatabaseProcessor {
    type Output = Option<PaymentTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionById")]
    async fn process(
        &self,
        query: GetTransactionById,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM payment_transactions WHERE id = $1");
        sqlx::query_as::<_, PaymentTransaction>(&sql)
            .bind(query.id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// A merchant's transaction by the order id it shares with the gateway.
pub struct GetTransactionByOrder {
    pub merchant_id: Uuid,
    pub order_id: String,
}

impl Processor<GetTransactionByOrder> for DatabaseProcessor {
    type Output = Option<PaymentTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionByOrder")]
    async fn process(
        &self,
        query: GetTransactionByOrder,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM payment_transactions \
             WHERE merchant_id = $1 AND order_id = $2"
        );
        sqlx::query_as::<_, PaymentTransaction>(&sql)
            .bind(query.merchant_id)
            .bind(query.order_id)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Write the mutable columns if `version` still matches.
///
/// Returns the stored row with its bumped version, or `None` on a version
/// mismatch.
pub struct UpdateTransactionChecked {
    pub transaction: PaymentTransaction,
}

impl Processor<UpdateTransactionChecked> for DatabaseProcessor {
    type Output = Option<PaymentTransaction>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateTransactionChecked")]
    async fn process(
        &self,
        update: UpdateTransactionChecked,
    ) -> Result<Option<PaymentTransaction>, sqlx::Error> {
        let transaction = update.transaction;
        let sql = format!(
            r#"
            UPDATE payment_transactions SET
                status = $3,
                status_description = $4,
                environment = $5,
                amount = $6,
                balance = $7,
                request_timestamp = $8,
                request_data = $9,
                initial_response_data = $10,
                last_query_data = $11,
                callback_data = $12,
                callback_timestamp = $13,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND version = $2
            RETURNING {SELECT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PaymentTransaction>(&sql)
            .bind(transaction.id)
            .bind(transaction.version)
            .bind(transaction.status)
            .bind(transaction.status_description)
            .bind(transaction.environment)
            .bind(transaction.amount)
            .bind(transaction.balance)
            .bind(transaction.request_timestamp)
            .bind(transaction.request_data)
            .bind(transaction.initial_response_data)
            .bind(transaction.last_query_data)
            .bind(transaction.callback_data)
            .bind(transaction.callback_timestamp)
            .fetch_optional(&self.pool)
            .await
    }
}

#[async_trait]
impl TransactionStore for DatabaseProcessor {
    async fn find_transaction(&self, id: Uuid) -> Result<Option<PaymentTransaction>, StoreError> {
        Ok(self.process(GetTransactionById { id }).await?)
    }

    async fn find_transaction_by_order(
        &self,
        merchant_id: Uuid,
        order_id: &str,
    ) -> Result<Option<PaymentTransaction>, StoreError> {
        Ok(self
            .process(GetTransactionByOrder {
                merchant_id,
                order_id: order_id.to_string(),
            })
            .await?)
    }

    async fn save_transaction(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<PaymentTransaction, StoreError> {
        self.process(UpdateTransactionChecked {
            transaction: transaction.clone(),
        })
        .await?
        .ok_or(StoreError::Conflict {
            entity: "payment transaction",
            id: transaction.id,
        })
    }
}
