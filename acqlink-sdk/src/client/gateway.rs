//! Typed operations against the gateway's merchant API.

use std::sync::Arc;
use tracing::{debug, error, info};
use url::Url;

use super::transport::{GatewayHttpRequest, GatewayTransport, HttpMethod};
use super::{ClientError, GatewayExchange, GatewayReply};
use crate::config::GatewayConfig;
use crate::objects::client::ClientDetails;
use crate::objects::envelope::{GatewayEnvelope, ReplyPayload};
use crate::objects::payment::{PaymentReply, PaymentRequest};
use crate::signature::{SIGNATURE_VERSION, sign_placement};

const API_KEY_HEADER: &str = "x-api-key";

/// Stateless gateway client. Credentials are passed per call, so one client
/// serves every merchant and environment.
#[derive(Clone)]
pub struct GatewayClient {
    transport: Arc<dyn GatewayTransport>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient").finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(transport: Arc<dyn GatewayTransport>) -> Self {
        Self { transport }
    }

    /// Normalize the amount, then sign.
    ///
    /// Signing must see the amount exactly as it is transmitted, so this is
    /// the only place a placement gets its signature.
    pub fn prepare_placement(mut request: PaymentRequest, config: &GatewayConfig) -> PaymentRequest {
        request.normalize_amount();
        request.signature = Some(sign_placement(&request, &config.merchant_key));
        request.signature_version = Some(SIGNATURE_VERSION.to_string());
        request
    }

    /// `POST {base}/merchants/{mid}/transactions/`
    ///
    /// Returns the raw exchange; decode it with [`GatewayExchange::decode`].
    pub async fn place_transaction(
        &self,
        request: PaymentRequest,
        config: &GatewayConfig,
    ) -> Result<GatewayExchange, ClientError> {
        info!(order_id = %request.order_id, "Placing transaction");
        let request = Self::prepare_placement(request, config);
        let body = serde_json::to_string(&request)?;
        let url = endpoint(config, &["transactions", ""])?;

        let exchange = self.exchange(HttpMethod::Post, url, Some(body), config).await?;
        if !exchange.is_success() {
            let detail = exchange
                .decode::<PaymentReply>()
                .map(|envelope| envelope.describe_error())
                .unwrap_or_else(|e| e.to_string());
            error!(
                status = exchange.status,
                order_id = %request.order_id,
                error = %detail,
                "Gateway rejected transaction placement"
            );
        }
        Ok(exchange)
    }

    /// `GET {base}/merchants/{mid}/transactions/{orderId}`
    pub async fn query_transaction(
        &self,
        order_id: &str,
        config: &GatewayConfig,
    ) -> Result<GatewayReply<PaymentReply>, ClientError> {
        info!(order_id, "Querying transaction");
        let url = endpoint(config, &["transactions", order_id])?;
        self.fetch(url, config, "orderId", order_id).await
    }

    /// `GET {base}/merchants/{mid}/clients/{clientId}`
    pub async fn get_client(
        &self,
        client_id: &str,
        config: &GatewayConfig,
    ) -> Result<GatewayReply<ClientDetails>, ClientError> {
        info!(client_id, "Fetching client details");
        let url = endpoint(config, &["clients", client_id])?;
        self.fetch(url, config, "clientId", client_id).await
    }

    /// `GET {base}/merchants/{mid}/clients[?next=..]`
    ///
    /// Pass the previous page's `next` token to continue a listing.
    pub async fn list_clients(
        &self,
        next: Option<&str>,
        config: &GatewayConfig,
    ) -> Result<GatewayReply<Vec<ClientDetails>>, ClientError> {
        let next = next.map(str::trim).filter(|token| !token.is_empty());
        info!(next = next.unwrap_or("-"), "Listing clients");
        let mut url = endpoint(config, &["clients"])?;
        if let Some(token) = next {
            url.query_pairs_mut().append_pair("next", token);
        }
        self.fetch(url, config, "nextClientId", next.unwrap_or("-")).await
    }

    async fn fetch<T: ReplyPayload>(
        &self,
        url: Url,
        config: &GatewayConfig,
        subject: &'static str,
        id: &str,
    ) -> Result<GatewayReply<T>, ClientError> {
        let exchange = self.exchange(HttpMethod::Get, url, None, config).await?;
        let envelope = GatewayEnvelope::<T>::parse(&exchange.response_body)?;
        if !exchange.is_success() {
            error!(
                status = exchange.status,
                subject,
                id,
                error = %envelope.describe_error(),
                "Gateway returned an error status"
            );
        }
        Ok(GatewayReply { exchange, envelope })
    }

    async fn exchange(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<String>,
        config: &GatewayConfig,
    ) -> Result<GatewayExchange, ClientError> {
        let mut headers = vec![("Content-Type", "application/json".to_string())];
        if let Some(api_key) = &config.api_key {
            headers.push((API_KEY_HEADER, api_key.clone()));
        }
        debug!(method = %method, url = %url, "Gateway request");

        let request = GatewayHttpRequest {
            method,
            url: url.clone(),
            headers,
            body: body.clone(),
        };
        let response = self.transport.execute(request).await?;
        debug!(
            method = %method,
            url = %url,
            status = response.status,
            "Gateway response"
        );

        Ok(GatewayExchange {
            method,
            url: url.to_string(),
            request_body: body,
            status: response.status,
            response_body: response.body,
        })
    }
}

/// `{base}/merchants/{mid}/{tail...}` with every segment percent-encoded.
fn endpoint(config: &GatewayConfig, tail: &[&str]) -> Result<Url, ClientError> {
    let mut url = config.base_url.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(config.base_url.to_string()))?;
        segments
            .pop_if_empty()
            .push("merchants")
            .push(&config.merchant_mid)
            .extend(tail);
    }
    Ok(url)
}
