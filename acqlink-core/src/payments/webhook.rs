//! Inbound payment notifications from the gateway.

use std::sync::Arc;

use acqlink_sdk::objects::WebhookReply;
use acqlink_sdk::signature::verify_webhook;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use super::merge::apply_reply;
use crate::events::{BalanceEvent, BalanceEventSender, publish};
use crate::framework::{MerchantStore, TransactionStore};

pub struct WebhookProcessor {
    transactions: Arc<dyn TransactionStore>,
    merchants: Arc<dyn MerchantStore>,
    balance_tx: Option<BalanceEventSender>,
}

impl WebhookProcessor {
    pub fn new(transactions: Arc<dyn TransactionStore>, merchants: Arc<dyn MerchantStore>) -> Self {
        Self {
            transactions,
            merchants,
            balance_tx: None,
        }
    }

    /// Request a balance refresh when a notified transaction has no balance.
    pub fn with_balance_events(mut self, balance_tx: BalanceEventSender) -> Self {
        self.balance_tx = Some(balance_tx);
        self
    }

    pub async fn process_webhook(&self, reply: WebhookReply) -> bool {
        self.process_webhook_at(reply, OffsetDateTime::now_utc()).await
    }

    /// Verify and apply one notification. Returns `false` when it was
    /// rejected; every rejection is logged.
    pub async fn process_webhook_at(&self, reply: WebhookReply, now: OffsetDateTime) -> bool {
        info!(
            order_id = ?reply.order_id,
            merchant_id = ?reply.merchant_id,
            success = ?reply.success,
            "Processing webhook"
        );

        let (Some(order_id), Some(gateway_mid)) = (non_blank(&reply.order_id), non_blank(&reply.merchant_id))
        else {
            warn!(
                order_id = ?reply.order_id,
                merchant_id = ?reply.merchant_id,
                "Webhook missing required fields"
            );
            return false;
        };

        let merchant = match self.merchants.find_merchant_by_gateway_mid(gateway_mid).await {
            Ok(Some(merchant)) => merchant,
            Ok(None) => {
                warn!(gateway_mid, "Merchant not found for webhook");
                return false;
            }
            Err(e) => {
                error!(gateway_mid, error = %e, "Failed to load merchant for webhook");
                return false;
            }
        };

        let environment = merchant.environment_of_mid(gateway_mid).unwrap_or(merchant.mode);
        let merchant_key = merchant.credentials(environment).key;
        if merchant_key.is_none() {
            error!(
                gateway_mid,
                environment = %environment,
                "Cannot verify webhook signature: merchant key not configured"
            );
            return false;
        }
        if !verify_webhook(&reply, merchant_key) {
            error!(gateway_mid, order_id, "Webhook signature verification failed");
            return false;
        }

        let mut transaction = match self
            .transactions
            .find_transaction_by_order(merchant.id, order_id)
            .await
        {
            Ok(Some(transaction)) => transaction,
            Ok(None) => {
                warn!(
                    merchant_id = %merchant.id,
                    order_id,
                    gateway_mid,
                    "No payment transaction found for webhook"
                );
                return false;
            }
            Err(e) => {
                error!(merchant_id = %merchant.id, order_id, error = %e, "Failed to load transaction for webhook");
                return false;
            }
        };

        let report = apply_reply(&mut transaction, &reply);
        transaction.callback_data = serde_json::to_string(&reply).ok();
        transaction.callback_timestamp = Some(now);
        let transaction = match self.transactions.save_transaction(&transaction).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(transaction_id = %transaction.id, error = %e, "Failed to save webhook update");
                return false;
            }
        };
        if report.has_changes() {
            info!(
                transaction_id = %transaction.id,
                merchant_id = %merchant.id,
                order_id = %transaction.order_id,
                changes = %report.change_log(),
                "Payment transaction updated from webhook"
            );
        } else {
            debug!(transaction_id = %transaction.id, "Webhook carried no changes");
        }

        if transaction.balance.is_none()
            && let Some(tx) = &self.balance_tx
        {
            info!(transaction_id = %transaction.id, "Balance unknown after webhook, requesting refresh");
            publish(
                tx,
                BalanceEvent::BalanceRefreshRequested {
                    transaction_id: transaction.id,
                    merchant_id: merchant.id,
                },
            );
        }

        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TransactionStatus;
    use crate::events::balance_event_channel;
    use crate::testing::{InMemoryStore, dec, merchant, pending_transaction};
    use acqlink_sdk::signature::sign_webhook;
    use uuid::Uuid;

    fn signed_reply(key: &str, mid: &str) -> WebhookReply {
        let mut reply = WebhookReply {
            success: Some("Y".to_string()),
            client_id: Some("CLN-001".to_string()),
            order_id: Some("ORD-1001".to_string()),
            amount: Some(dec("10.50")),
            currency: Some("USD".to_string()),
            merchant_id: Some(mid.to_string()),
            ..Default::default()
        };
        reply.signature = Some(sign_webhook(&reply, key));
        reply
    }

    fn setup() -> (InMemoryStore, Uuid, Uuid) {
        let store = InMemoryStore::default();
        let m = merchant();
        store.insert_merchant(m.clone());
        let txn = pending_transaction(m.id);
        let transaction_id = txn.id;
        store.insert_transaction(txn);
        (store, m.id, transaction_id)
    }

    fn processor(store: &InMemoryStore) -> WebhookProcessor {
        let store = Arc::new(store.clone());
        WebhookProcessor::new(store.clone(), store)
    }

    #[tokio::test]
    async fn valid_webhook_updates_transaction_and_requests_balance() {
        let (store, merchant_id, transaction_id) = setup();
        let (tx, mut rx) = balance_event_channel();
        let now = time::macros::datetime!(2025-06-01 12:00 UTC);

        let accepted = processor(&store)
            .with_balance_events(tx)
            .process_webhook_at(signed_reply("test-key", "TEST-MID"), now)
            .await;

        assert!(accepted);
        let stored = store.transaction(transaction_id);
        assert_eq!(stored.status, TransactionStatus::Success);
        assert_eq!(stored.callback_timestamp, Some(now));
        assert!(stored.callback_data.unwrap().contains("ORD-1001"));
        assert_eq!(
            rx.recv().await,
            Some(BalanceEvent::BalanceRefreshRequested {
                transaction_id,
                merchant_id
            })
        );
    }

    #[tokio::test]
    async fn live_mid_is_verified_with_live_key() {
        let (store, _, transaction_id) = setup();
        assert!(
            processor(&store)
                .process_webhook(signed_reply("live-key", "LIVE-MID"))
                .await
        );
        assert_eq!(store.transaction(transaction_id).status, TransactionStatus::Success);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (store, _, transaction_id) = setup();
        let accepted = processor(&store)
            .process_webhook(signed_reply("wrong-key", "TEST-MID"))
            .await;
        assert!(!accepted);
        let stored = store.transaction(transaction_id);
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn unknown_merchant_and_missing_fields_are_rejected() {
        let (store, _, _) = setup();
        assert!(
            !processor(&store)
                .process_webhook(signed_reply("test-key", "NOBODY"))
                .await
        );

        let mut reply = signed_reply("test-key", "TEST-MID");
        reply.order_id = None;
        assert!(!processor(&store).process_webhook(reply).await);
    }

    #[tokio::test]
    async fn unknown_order_is_rejected() {
        let (store, _, _) = setup();
        let mut reply = signed_reply("test-key", "TEST-MID");
        reply.order_id = Some("ORD-404".to_string());
        reply.signature = Some(sign_webhook(&reply, "test-key"));
        assert!(!processor(&store).process_webhook(reply).await);
    }

    #[tokio::test]
    async fn known_balance_skips_refresh() {
        let (store, _, _) = setup();
        let (tx, mut rx) = balance_event_channel();
        let mut reply = signed_reply("test-key", "TEST-MID");
        reply.balance = Some(dec("120.00"));
        assert!(
            processor(&store)
                .with_balance_events(tx)
                .process_webhook(reply)
                .await
        );
        assert!(rx.try_recv().is_err());
    }
}
