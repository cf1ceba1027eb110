//! Sending a RECEIVED transaction to the gateway.

use std::sync::Arc;

use acqlink_sdk::client::GatewayClient;
use acqlink_sdk::objects::{ClientDetails, GatewayMessage, PaymentReply, PaymentRequest, ValidationError};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::entities::TransactionStatus;
use crate::entities::payment_transaction::{PaymentTransaction, TransactionView};
use crate::framework::{StoreError, TaskQueue, TransactionStore};
use crate::processors::payment_status::PaymentStatusTask;

/// Gateway status codes that mean the placement was accepted.
const ACCEPTED_STATUS_CODES: [u16; 3] = [200, 201, 210];

const NO_DESCRIPTION: &str = "No status description available";

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("payment transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("merchant {merchant_id} cannot place transaction {transaction_id}")]
    AccessDenied {
        transaction_id: Uuid,
        merchant_id: Uuid,
    },

    #[error("payment transaction {transaction_id} is {status}, expected RECEIVED")]
    NotReceived {
        transaction_id: Uuid,
        status: TransactionStatus,
    },

    #[error("invalid payment request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Human readable summary of a gateway status block: detail and reason
/// when both exist, otherwise the first non-blank of detail, reason and
/// message.
pub fn describe_status(message: Option<&GatewayMessage>) -> String {
    let Some(message) = message else {
        return NO_DESCRIPTION.to_string();
    };
    let non_blank = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    match (non_blank(&message.detail), non_blank(&message.reason)) {
        (Some(detail), Some(reason)) => format!("{detail}. {reason}"),
        (Some(detail), None) => detail,
        (None, Some(reason)) => reason,
        (None, None) => non_blank(&message.message).unwrap_or_else(|| NO_DESCRIPTION.to_string()),
    }
}

pub struct PaymentPlacement {
    transactions: Arc<dyn TransactionStore>,
    queue: Arc<dyn TaskQueue>,
    client: GatewayClient,
}

impl PaymentPlacement {
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        queue: Arc<dyn TaskQueue>,
        client: GatewayClient,
    ) -> Self {
        Self {
            transactions,
            queue,
            client,
        }
    }

    pub async fn place_payment(
        &self,
        transaction_id: Uuid,
        client: Option<ClientDetails>,
        context: &RequestContext,
    ) -> Result<TransactionView, PlacementError> {
        self.place_payment_at(transaction_id, client, context, OffsetDateTime::now_utc())
            .await
    }

    /// Place the transaction as of `now`. On acceptance the transaction
    /// becomes PENDING and its first status query is scheduled.
    pub async fn place_payment_at(
        &self,
        transaction_id: Uuid,
        client: Option<ClientDetails>,
        context: &RequestContext,
        now: OffsetDateTime,
    ) -> Result<TransactionView, PlacementError> {
        let mut transaction = self
            .transactions
            .find_transaction(transaction_id)
            .await?
            .ok_or(PlacementError::TransactionNotFound(transaction_id))?;
        if !context.can_access(&transaction) {
            return Err(PlacementError::AccessDenied {
                transaction_id,
                merchant_id: context.merchant.merchant_id,
            });
        }
        if transaction.status != TransactionStatus::Received {
            return Err(PlacementError::NotReceived {
                transaction_id,
                status: transaction.status,
            });
        }

        let mut request = payment_request(&transaction, client);
        request.validate()?;
        let config = context.merchant.gateway_for(&transaction);

        transaction.request_timestamp = Some(now);
        transaction.environment = Some(context.merchant.environment);

        match self.client.place_transaction(request.clone(), &config).await {
            Ok(exchange) => {
                transaction.request_data = exchange.request_body.clone();
                transaction.initial_response_data = Some(exchange.response_body.clone());
                match exchange.decode::<PaymentReply>() {
                    Ok(envelope) => {
                        let (status, description) = match &envelope.response {
                            None => (
                                TransactionStatus::Failed,
                                "ERROR: Gateway response is null".to_string(),
                            ),
                            Some(message) if ACCEPTED_STATUS_CODES.contains(&message.status_code) => {
                                (TransactionStatus::Pending, describe_status(Some(message)))
                            }
                            Some(message) => (TransactionStatus::Failed, describe_status(Some(message))),
                        };
                        transaction.status = status;
                        transaction.status_description = Some(description);
                    }
                    Err(e) => {
                        warn!(transaction_id = %transaction.id, error = %e, "Undecodable placement response");
                        transaction.status_description = Some(format!("ERROR: {e}"));
                    }
                }
            }
            Err(e) => {
                error!(transaction_id = %transaction.id, error = %e, "Error placing payment");
                let prepared = GatewayClient::prepare_placement(request, &config);
                transaction.request_data = serde_json::to_string(&prepared).ok();
                transaction.status_description = Some(format!("ERROR: {e}"));
            }
        }

        let transaction = self.transactions.save_transaction(&transaction).await?;
        info!(
            transaction_id = %transaction.id,
            order_id = %transaction.order_id,
            status = %transaction.status,
            "Payment placed"
        );

        if transaction.status == TransactionStatus::Pending {
            let task = PaymentStatusTask::initial_task(transaction.id, now);
            if !self.queue.enqueue_unique(task).await? {
                info!(transaction_id = %transaction.id, "Status query already scheduled");
            }
        }

        Ok(TransactionView::from(&transaction))
    }
}

fn payment_request(transaction: &PaymentTransaction, client: Option<ClientDetails>) -> PaymentRequest {
    PaymentRequest {
        client_id: transaction.client_id.clone(),
        client,
        order_id: transaction.order_id.clone(),
        reply_url: transaction.reply_url.clone(),
        backoffice_url: transaction.backoffice_url.clone(),
        amount: transaction.amount,
        currency: transaction.currency.clone(),
        card_type: transaction.payment_brand.map(Into::into),
        ..Default::default()
    }
}
