//! Placement requests and the payment reply shared by the query endpoint and
//! the webhook callback.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use super::client::{ClientDetails, ValidationError};
use super::datetime::{gateway_instant, lenient_decimal, lenient_string, settlement_date};

/// Card scheme the payment is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    UnionPay,
    WechatPay,
    Alipay,
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardType::UnionPay => write!(f, "UnionPay"),
            CardType::WechatPay => write!(f, "WechatPay"),
            CardType::Alipay => write!(f, "Alipay"),
        }
    }
}

/// Outbound placement body (`POST /merchants/{mid}/transactions/`).
///
/// `signature` and `signature_version` are filled in by the client right
/// before sending, after the amount has been normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(rename = "clientID", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub echo: Option<String>,
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "replyURL", skip_serializing_if = "Option::is_none")]
    pub reply_url: Option<String>,
    #[serde(rename = "backofficeURL", skip_serializing_if = "Option::is_none")]
    pub backoffice_url: Option<String>,
    /// Rendered as a JSON string.
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
    #[serde(default)]
    pub send_email: u8,
}

impl PaymentRequest {
    /// Check the request before it is signed.
    ///
    /// A blank `clientID` is taken from the embedded client record when one
    /// is present.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let blank = self
            .client_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty());
        if blank {
            let embedded = self
                .client
                .as_ref()
                .and_then(|c| c.client_id.clone())
                .filter(|id| !id.trim().is_empty());
            match embedded {
                Some(id) => self.client_id = Some(id),
                None => return Err(ValidationError::BlankClientId),
            }
        }
        if let Some(client) = &self.client {
            if client.client_id != self.client_id {
                return Err(ValidationError::ClientIdMismatch {
                    request: self.client_id.clone().unwrap_or_default(),
                    client: client.client_id.clone().unwrap_or_default(),
                });
            }
            client
                .validate()
                .map_err(|e| ValidationError::Client(Box::new(e)))?;
        }
        Ok(())
    }

    /// Strip trailing zeros from the amount (`10.50` becomes `10.5`).
    pub fn normalize_amount(&mut self) {
        self.amount = self.amount.normalize();
    }
}

/// Final or intermediate outcome reported by the gateway for a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOutcome {
    Success,
    Pending,
    Abandoned,
    Failed,
}

/// Payment state as reported by the gateway, either in a query reply or in a
/// webhook callback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReply {
    #[serde(default, with = "lenient_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, with = "lenient_decimal")]
    pub balance: Option<Decimal>,
    #[serde(rename = "clientID", default, with = "lenient_string")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, with = "gateway_instant")]
    pub date: Option<OffsetDateTime>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(rename = "merchantID", default, with = "lenient_string")]
    pub merchant_id: Option<String>,
    #[serde(rename = "orderID", default, with = "lenient_string")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, with = "lenient_string")]
    pub result: Option<String>,
    #[serde(default, with = "settlement_date")]
    pub settlement: Option<Date>,
    #[serde(default)]
    pub signature: Option<String>,
    /// `Y` or `N`.
    #[serde(default, with = "lenient_string")]
    pub success: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Set when the gateway answers with an HTML page instead of a JSON
    /// reply object.
    #[serde(default)]
    pub html: Option<String>,
}

impl PaymentReply {
    /// Interpret `result`, then `success`.
    ///
    /// `0` is success, `1` pending, `11` abandoned; for any other result code
    /// `Y`/`N` decide. Returns `None` when the reply says nothing usable.
    pub fn outcome(&self) -> Option<GatewayOutcome> {
        match self.result.as_deref().map(str::trim) {
            Some("0") => return Some(GatewayOutcome::Success),
            Some("1") => return Some(GatewayOutcome::Pending),
            Some("11") => return Some(GatewayOutcome::Abandoned),
            _ => {}
        }
        match self.success.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("Y") => Some(GatewayOutcome::Success),
            Some(s) if s.eq_ignore_ascii_case("N") => Some(GatewayOutcome::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request() -> PaymentRequest {
        PaymentRequest {
            client_id: Some("CLN-001".to_string()),
            order_id: "ABC-123".to_string(),
            amount: Decimal::from_str("10.12").unwrap(),
            currency: "USD".to_string(),
            card_type: Some(CardType::UnionPay),
            ..Default::default()
        }
    }

    #[test]
    fn request_serializes_gateway_field_names() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "clientID": "CLN-001",
                "orderID": "ABC-123",
                "amount": "10.12",
                "currency": "USD",
                "cardType": "UnionPay",
                "sendEmail": 0
            })
        );
    }

    #[test]
    fn optional_urls_use_upper_case_suffix() {
        let mut req = request();
        req.reply_url = Some("https://shop.example/reply".to_string());
        req.backoffice_url = Some("https://shop.example/bo".to_string());
        let json = serde_json::to_value(req).unwrap();
        assert_eq!(json["replyURL"], "https://shop.example/reply");
        assert_eq!(json["backofficeURL"], "https://shop.example/bo");
    }

    #[test]
    fn normalize_strips_trailing_zeros() {
        let mut req = request();
        req.amount = Decimal::from_str("10.50").unwrap();
        req.normalize_amount();
        assert_eq!(req.amount.to_string(), "10.5");

        req.amount = Decimal::from_str("100.00").unwrap();
        req.normalize_amount();
        assert_eq!(req.amount.to_string(), "100");
    }

    #[test]
    fn client_id_is_taken_from_embedded_client() {
        let mut req = request();
        req.client_id = None;
        req.client = Some(ClientDetails {
            client_id: Some("CLN-777".to_string()),
            ..Default::default()
        });
        req.validate().unwrap();
        assert_eq!(req.client_id.as_deref(), Some("CLN-777"));
    }

    #[test]
    fn mismatched_client_ids_are_rejected() {
        let mut req = request();
        req.client = Some(ClientDetails {
            client_id: Some("OTHER".to_string()),
            ..Default::default()
        });
        assert_eq!(
            req.validate().unwrap_err().to_string(),
            "clientId mismatch (CLN-001 and OTHER)"
        );
    }

    #[test]
    fn missing_client_id_is_rejected() {
        let mut req = request();
        req.client_id = Some(String::new());
        assert_eq!(req.validate(), Err(ValidationError::BlankClientId));
    }

    #[test]
    fn invalid_embedded_client_is_reported() {
        let mut req = request();
        req.client = Some(ClientDetails {
            client_id: Some("CLN-001".to_string()),
            black: Some(false),
            ..Default::default()
        });
        assert_eq!(
            req.validate().unwrap_err().to_string(),
            "client is not valid (black cannot be set)"
        );
    }

    #[test]
    fn outcome_prefers_result_code() {
        let reply = |result: Option<&str>, success: Option<&str>| PaymentReply {
            result: result.map(str::to_string),
            success: success.map(str::to_string),
            ..Default::default()
        };
        assert_eq!(reply(Some("0"), Some("N")).outcome(), Some(GatewayOutcome::Success));
        assert_eq!(reply(Some("1"), None).outcome(), Some(GatewayOutcome::Pending));
        assert_eq!(reply(Some("11"), Some("N")).outcome(), Some(GatewayOutcome::Abandoned));
        assert_eq!(reply(Some("5"), Some("Y")).outcome(), Some(GatewayOutcome::Success));
        assert_eq!(reply(None, Some("N")).outcome(), Some(GatewayOutcome::Failed));
        assert_eq!(reply(Some("7"), None).outcome(), None);
        assert_eq!(reply(None, None).outcome(), None);
    }
}
