//! Gateway credentials for one merchant in one environment.
//!
//! The server resolves these from the merchant record; the client only ever
//! sees the resolved, validated form.

use url::Url;

#[derive(Clone)]
pub struct GatewayConfig {
    /// Root URL of the gateway API, e.g. `https://gw.example.net/api/v1`.
    pub base_url: Url,
    /// The merchant's id at the gateway (`MID`).
    pub merchant_mid: String,
    /// Shared secret used in signatures. Never sent on the wire.
    pub merchant_key: String,
    /// Sent as `x-api-key` when present.
    pub api_key: Option<String>,
    pub reply_url: Option<String>,
    pub backoffice_url: Option<String>,
}

impl GatewayConfig {
    pub fn new(base_url: Url, merchant_mid: impl Into<String>, merchant_key: impl Into<String>) -> Self {
        Self {
            base_url,
            merchant_mid: merchant_mid.into(),
            merchant_key: merchant_key.into(),
            api_key: None,
            reply_url: None,
            backoffice_url: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url.as_str())
            .field("merchant_mid", &self.merchant_mid)
            .field("merchant_key", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("reply_url", &self.reply_url)
            .field("backoffice_url", &self.backoffice_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let config = GatewayConfig::new(
            Url::parse("https://gw.example.net").unwrap(),
            "MID-1",
            "super-secret",
        )
        .with_api_key("api-secret");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("MID-1"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("api-secret"));
    }
}
