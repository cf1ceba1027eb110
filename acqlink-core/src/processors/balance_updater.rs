//! BalanceUpdater processor.
//!
//! Consumes [`BalanceEvent`]s:
//! - `BalanceRefreshRequested`: re-query the gateway for the transaction so
//!   the reply's balance gets recorded (the query emits
//!   `MerchantBalanceChanged` in turn)
//! - `MerchantBalanceChanged`: store the merchant balance if it differs

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::{ContextError, RequestContext};
use crate::events::{BalanceEvent, BalanceEventReceiver};
use crate::framework::{MerchantStore, StoreError, TransactionStore};
use crate::payments::query::{PaymentQueryService, QueryError};

const INITIATOR: &str = "event:balance-refresh";

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub struct BalanceUpdater {
    transactions: Arc<dyn TransactionStore>,
    merchants: Arc<dyn MerchantStore>,
    query: Arc<dyn PaymentQueryService>,
}

impl BalanceUpdater {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        merchants: Arc<dyn MerchantStore>,
        query: Arc<dyn PaymentQueryService>,
    ) -> Self {
        Self {
            transactions,
            merchants,
            query,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>, mut event_rx: BalanceEventReceiver) {
        info!("BalanceUpdater started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("BalanceUpdater received shutdown signal");
                        break;
                    }
                }

                Some(event) = event_rx.recv() => {
                    debug!(event = ?event, "Received BalanceEvent");
                    if let Err(e) = self.process(event.clone()).await {
                        error!(event = ?event, error = %e, "Failed to process BalanceEvent");
                    }
                }

                else => {
                    info!("BalanceEvent channel closed");
                    break;
                }
            }
        }

        info!("BalanceUpdater shutdown complete");
    }

    pub async fn process(&self, event: BalanceEvent) -> Result<(), BalanceError> {
        match event {
            BalanceEvent::BalanceRefreshRequested {
                transaction_id,
                merchant_id,
            } => self.refresh(transaction_id, merchant_id).await,
            BalanceEvent::MerchantBalanceChanged { merchant_id, balance } => {
                self.store_balance(merchant_id, balance).await
            }
        }
    }

    async fn refresh(&self, transaction_id: Uuid, merchant_id: Uuid) -> Result<(), BalanceError> {
        let Some(transaction) = self.transactions.find_transaction(transaction_id).await? else {
            warn!(transaction_id = %transaction_id, "Transaction not found for balance refresh");
            return Ok(());
        };
        if transaction.balance.is_some() {
            debug!(transaction_id = %transaction_id, "Balance already known, skipping refresh");
            return Ok(());
        }
        let Some(merchant) = self.merchants.find_merchant(merchant_id).await? else {
            warn!(merchant_id = %merchant_id, "Merchant not found for balance refresh");
            return Ok(());
        };

        let context = RequestContext::for_merchant(&merchant, INITIATOR)?;
        info!(transaction_id = %transaction_id, "Querying gateway for balance refresh");
        self.query
            .query_payment_from_gateway(transaction_id, &context)
            .await?;
        Ok(())
    }

    async fn store_balance(&self, merchant_id: Uuid, balance: Decimal) -> Result<(), BalanceError> {
        if self.merchants.update_merchant_balance(merchant_id, balance).await? {
            info!(merchant_id = %merchant_id, balance = %balance, "Merchant balance updated");
        } else {
            debug!(merchant_id = %merchant_id, "Merchant balance unchanged or merchant missing");
        }
        Ok(())
    }
}
