//! Gateway status queries for a stored transaction.

use std::sync::Arc;

use acqlink_sdk::client::{ClientError, GatewayClient};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::merge::apply_reply;
use crate::context::RequestContext;
use crate::entities::payment_transaction::TransactionView;
use crate::events::{BalanceEvent, BalanceEventSender, publish};
use crate::framework::{StoreError, TransactionStore};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("payment transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("merchant {merchant_id} cannot query transaction {transaction_id}")]
    AccessDenied {
        transaction_id: Uuid,
        merchant_id: Uuid,
    },

    #[error("gateway error: {0}")]
    Gateway(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait PaymentQueryService: Send + Sync {
    /// Ask the gateway for the transaction's current state and fold the
    /// answer into the stored row. Safe to call repeatedly.
    async fn query_payment_from_gateway(
        &self,
        transaction_id: Uuid,
        context: &RequestContext,
    ) -> Result<TransactionView, QueryError>;
}

#[derive(Clone)]
pub struct GatewayQueryService {
    transactions: Arc<dyn TransactionStore>,
    client: GatewayClient,
    balance_tx: Option<BalanceEventSender>,
}

impl GatewayQueryService {
    pub fn new(transactions: Arc<dyn TransactionStore>, client: GatewayClient) -> Self {
        Self {
            transactions,
            client,
            balance_tx: None,
        }
    }

    /// Emit `MerchantBalanceChanged` whenever a queried transaction carries
    /// a balance.
    pub fn with_balance_events(mut self, balance_tx: BalanceEventSender) -> Self {
        self.balance_tx = Some(balance_tx);
        self
    }
}

#[async_trait]
impl PaymentQueryService for GatewayQueryService {
    async fn query_payment_from_gateway(
        &self,
        transaction_id: Uuid,
        context: &RequestContext,
    ) -> Result<TransactionView, QueryError> {
        debug!(transaction_id = %transaction_id, initiator = %context.initiator, "Querying payment");

        let mut transaction = self
            .transactions
            .find_transaction(transaction_id)
            .await?
            .ok_or(QueryError::TransactionNotFound(transaction_id))?;

        if !context.can_access(&transaction) {
            return Err(QueryError::AccessDenied {
                transaction_id,
                merchant_id: context.merchant.merchant_id,
            });
        }

        let config = context.merchant.gateway_for(&transaction);
        let reply = self
            .client
            .query_transaction(&transaction.order_id, &config)
            .await?;

        if reply.envelope.status_code() == Some(200) {
            // The gateway round trip can be slow; merge into the latest row.
            transaction = self
                .transactions
                .find_transaction(transaction_id)
                .await?
                .ok_or(QueryError::TransactionNotFound(transaction_id))?;

            match reply.envelope.payload() {
                Some(payment_reply) => {
                    let report = apply_reply(&mut transaction, payment_reply);
                    if report.has_changes() {
                        if payment_reply.date.is_some() {
                            transaction.last_query_data = Some(reply.exchange.response_body.clone());
                        }
                        transaction = self.transactions.save_transaction(&transaction).await?;
                        info!(
                            transaction_id = %transaction.id,
                            merchant_id = ?transaction.merchant_id,
                            order_id = %transaction.order_id,
                            changes = %report.change_log(),
                            "Payment transaction updated"
                        );
                    } else {
                        debug!(transaction_id = %transaction.id, "No changes from gateway query");
                    }
                }
                None => debug!(transaction_id = %transaction.id, "Gateway query returned no reply"),
            }
        } else {
            warn!(
                transaction_id = %transaction.id,
                status_code = ?reply.envelope.status_code(),
                error = %reply.envelope.describe_error(),
                "Gateway query did not succeed, transaction left unchanged"
            );
        }

        if let (Some(balance), Some(merchant_id), Some(tx)) =
            (transaction.balance, transaction.merchant_id, &self.balance_tx)
        {
            info!(merchant_id = %merchant_id, balance = %balance, "Publishing merchant balance update");
            publish(tx, BalanceEvent::MerchantBalanceChanged { merchant_id, balance });
        }

        Ok(TransactionView::from(&transaction))
    }
}
