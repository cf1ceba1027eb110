//! Composite MD5 signatures used by the gateway.
//!
//! Every signature is `md5_hex(clear_text)` where the clear text is a plain
//! concatenation of selected fields with the MD5 of the merchant key spliced
//! into the middle. Absent (or empty) optional fields contribute nothing.
//!
//! * **Placement** (outbound):
//!   `clientID? + lower(orderID) + md5(key) + amount + currency + replyURL? + backofficeURL?`
//!
//! * **Webhook** (inbound):
//!   `success? + clientID? + lower(orderID)? + md5(key) + amount? + currency? + merchantID?`
//!
//! The digest algorithm is fixed by the gateway.

use md5::{Digest, Md5};
use tracing::{debug, warn};

use crate::objects::payment::PaymentRequest;
use crate::objects::webhook::WebhookReply;

/// Value sent as `signatureVersion` with every signed request.
pub const SIGNATURE_VERSION: &str = "1.0";

/// MD5 digest as 32 lowercase hex characters.
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

fn push_opt(clear_text: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        clear_text.push_str(value);
    }
}

/// Clear text for an outbound placement. The request amount is used as is,
/// so normalize it first.
pub fn placement_clear_text(request: &PaymentRequest, merchant_key: &str) -> String {
    let mut clear_text = String::new();
    push_opt(&mut clear_text, request.client_id.as_deref());
    clear_text.push_str(&request.order_id.to_lowercase());
    clear_text.push_str(&md5_hex(merchant_key));
    clear_text.push_str(&request.amount.to_string());
    clear_text.push_str(&request.currency);
    push_opt(&mut clear_text, request.reply_url.as_deref());
    push_opt(&mut clear_text, request.backoffice_url.as_deref());
    clear_text
}

pub fn sign_placement(request: &PaymentRequest, merchant_key: &str) -> String {
    md5_hex(&placement_clear_text(request, merchant_key))
}

/// Clear text for a webhook reply. The amount is rendered with the scale it
/// arrived with.
pub fn webhook_clear_text(reply: &WebhookReply, merchant_key: &str) -> String {
    let mut clear_text = String::new();
    push_opt(&mut clear_text, reply.success.as_deref());
    push_opt(&mut clear_text, reply.client_id.as_deref());
    if let Some(order_id) = &reply.order_id {
        clear_text.push_str(&order_id.to_lowercase());
    }
    clear_text.push_str(&md5_hex(merchant_key));
    if let Some(amount) = &reply.amount {
        clear_text.push_str(&amount.to_string());
    }
    push_opt(&mut clear_text, reply.currency.as_deref());
    push_opt(&mut clear_text, reply.merchant_id.as_deref());
    clear_text
}

pub fn sign_webhook(reply: &WebhookReply, merchant_key: &str) -> String {
    md5_hex(&webhook_clear_text(reply, merchant_key))
}

/// Check the signature carried by a webhook reply.
///
/// Never fails: a missing key or signature, or a mismatch, is logged and
/// reported as `false`. The comparison is constant time.
pub fn verify_webhook(reply: &WebhookReply, merchant_key: Option<&str>) -> bool {
    let (Some(merchant_key), Some(received)) = (merchant_key, reply.signature.as_deref()) else {
        warn!(
            order_id = reply.order_id.as_deref().unwrap_or("-"),
            "Cannot verify webhook signature: missing merchant key or signature"
        );
        return false;
    };

    let expected = sign_webhook(reply, merchant_key);
    let received = received.trim().to_ascii_lowercase();
    match ring::constant_time::verify_slices_are_equal(expected.as_bytes(), received.as_bytes()) {
        Ok(()) => {
            debug!(
                order_id = reply.order_id.as_deref().unwrap_or("-"),
                "Webhook signature verified"
            );
            true
        }
        Err(_) => {
            warn!(
                order_id = reply.order_id.as_deref().unwrap_or("-"),
                expected = %expected,
                received = %received,
                "Webhook signature mismatch"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::payment::CardType;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const KEY: &str = "merchant-secret";

    fn placement() -> PaymentRequest {
        PaymentRequest {
            client_id: Some("CLN-001".to_string()),
            order_id: "ABC-123".to_string(),
            amount: Decimal::from_str("10.12").unwrap(),
            currency: "USD".to_string(),
            card_type: Some(CardType::UnionPay),
            ..Default::default()
        }
    }

    fn webhook() -> WebhookReply {
        WebhookReply {
            success: Some("Y".to_string()),
            client_id: Some("TheClient".to_string()),
            order_id: Some("Order-77".to_string()),
            amount: Some(Decimal::from_str("25.00").unwrap()),
            currency: Some("USD".to_string()),
            merchant_id: Some("5adeaafb-1b6d-4bb2-ba11-1cce35e6b38e".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn md5_matches_known_vectors() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex("message digest"), "f96b697d7cb7938d525a2f31aaf161d0");
    }

    #[test]
    fn md5_keeps_leading_zeros() {
        // md5("jk8ssl") starts with a zero byte.
        let digest = md5_hex("jk8ssl");
        assert_eq!(digest, "0000000018e6137ac2caab16074784a6");
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn placement_clear_text_layout() {
        let mut request = placement();
        request.reply_url = Some("https://r".to_string());
        let expected = format!("CLN-001abc-123{}10.12USDhttps://r", md5_hex(KEY));
        assert_eq!(placement_clear_text(&request, KEY), expected);
        assert_eq!(sign_placement(&request, KEY), md5_hex(&expected));
    }

    #[test]
    fn placement_without_client_starts_with_order() {
        let mut request = placement();
        request.client_id = None;
        let clear_text = placement_clear_text(&request, KEY);
        assert!(clear_text.starts_with("abc-123"));
    }

    #[test]
    fn placement_signature_is_deterministic_and_field_sensitive() {
        let base = sign_placement(&placement(), KEY);
        assert_eq!(base, sign_placement(&placement(), KEY));

        let mut changed = placement();
        changed.amount = Decimal::from_str("10.13").unwrap();
        assert_ne!(base, sign_placement(&changed, KEY));

        let mut changed = placement();
        changed.currency = "AUD".to_string();
        assert_ne!(base, sign_placement(&changed, KEY));

        let mut changed = placement();
        changed.backoffice_url = Some("https://bo".to_string());
        assert_ne!(base, sign_placement(&changed, KEY));

        assert_ne!(base, sign_placement(&placement(), "other-key"));
    }

    #[test]
    fn order_id_case_does_not_matter() {
        let mut lower = placement();
        lower.order_id = "abc-123".to_string();
        assert_eq!(sign_placement(&lower, KEY), sign_placement(&placement(), KEY));
    }

    #[test]
    fn webhook_clear_text_layout() {
        let expected = format!(
            "YTheClientorder-77{}25.00USD5adeaafb-1b6d-4bb2-ba11-1cce35e6b38e",
            md5_hex(KEY)
        );
        assert_eq!(webhook_clear_text(&webhook(), KEY), expected);
    }

    #[test]
    fn webhook_round_trip() {
        let mut reply = webhook();
        reply.signature = Some(sign_webhook(&reply, KEY));
        assert!(verify_webhook(&reply, Some(KEY)));

        let mut upper = reply.clone();
        upper.signature = upper.signature.map(|s| s.to_uppercase());
        assert!(verify_webhook(&upper, Some(KEY)));
    }

    #[test]
    fn altered_webhook_fails_verification() {
        let mut reply = webhook();
        reply.signature = Some(sign_webhook(&reply, KEY));

        let mut tampered = reply.clone();
        tampered.amount = Some(Decimal::from_str("250.00").unwrap());
        assert!(!verify_webhook(&tampered, Some(KEY)));

        let mut tampered = reply.clone();
        tampered.success = Some("N".to_string());
        assert!(!verify_webhook(&tampered, Some(KEY)));

        assert!(!verify_webhook(&reply, Some("wrong-key")));
    }

    #[test]
    fn webhook_amount_scale_is_significant() {
        let mut reply = webhook();
        reply.signature = Some(sign_webhook(&reply, KEY));
        reply.amount = Some(Decimal::from_str("25").unwrap());
        assert!(!verify_webhook(&reply, Some(KEY)));
    }

    #[test]
    fn missing_inputs_resolve_to_false() {
        let reply = webhook();
        assert!(!verify_webhook(&reply, Some(KEY)));

        let mut signed = webhook();
        signed.signature = Some(sign_webhook(&signed, KEY));
        assert!(!verify_webhook(&signed, None));
    }
}
