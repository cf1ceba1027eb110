//! Webhook callback payloads.
//!
//! The gateway calls the merchant back with a `GET` whose query string
//! carries the same fields as a [`PaymentReply`]. Parameter casing is not
//! stable across gateway versions, so both `merchantID` and `merchantId`
//! style names are accepted.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use super::payment::PaymentReply;

/// A decoded webhook notification.
pub type WebhookReply = PaymentReply;

/// Raw webhook query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WebhookQuery {
    pub currency: Option<String>,
    pub success: Option<String>,
    #[serde(rename = "merchantID", alias = "merchantId")]
    pub merchant_id: Option<String>,
    #[serde(rename = "orderID", alias = "orderId")]
    pub order_id: Option<String>,
    #[serde(rename = "clientID", alias = "clientId")]
    pub client_id: Option<String>,
    pub amount: Option<String>,
    pub signature: Option<String>,
    pub detail: Option<String>,
}

impl WebhookQuery {
    /// True when the fields needed to route and authenticate the callback
    /// are all present.
    pub fn is_routable(&self) -> bool {
        [&self.merchant_id, &self.order_id, &self.signature]
            .iter()
            .all(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    /// Convert into a [`WebhookReply`].
    ///
    /// The amount keeps the scale it was sent with, since it is part of the
    /// signed clear text. An unparseable amount is dropped.
    pub fn into_reply(self) -> WebhookReply {
        let amount = self.amount.as_deref().and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            match Decimal::from_str(raw) {
                Ok(amount) => Some(amount),
                Err(e) => {
                    tracing::warn!(amount = raw, error = %e, "Ignoring unparseable webhook amount");
                    None
                }
            }
        });
        WebhookReply {
            amount,
            client_id: self.client_id,
            currency: self.currency,
            detail: self.detail,
            merchant_id: self.merchant_id,
            order_id: self.order_id,
            signature: self.signature,
            success: self.success,
            ..Default::default()
        }
    }
}
