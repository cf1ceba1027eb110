//! HTTP client for the acquiring gateway.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.
//!
//! The gateway reports business failures in the response envelope, often
//! with a non-2xx status. Those are logged and handed back to the caller;
//! only transport failures and undecodable bodies are [`ClientError`]s.

mod gateway;
mod transport;

pub use gateway::GatewayClient;
pub use transport::{
    GatewayHttpRequest, GatewayHttpResponse, GatewayTransport, HttpMethod, ReqwestTransport,
};

use crate::objects::ValidationError;
use crate::objects::envelope::{EnvelopeError, GatewayEnvelope, ReplyPayload};

/// Errors produced by the gateway client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, timeout, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body is not a gateway envelope.
    #[error("malformed gateway response: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Request body could not be serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configured base URL cannot carry a path.
    #[error("invalid gateway base url: {0}")]
    InvalidBaseUrl(String),

    /// The request was refused before sending.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),
}

/// One buffered request/response pair, kept for tracing and auditing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayExchange {
    pub method: HttpMethod,
    pub url: String,
    pub request_body: Option<String>,
    pub status: u16,
    pub response_body: String,
}

impl GatewayExchange {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the response body as an envelope.
    pub fn decode<T: ReplyPayload>(&self) -> Result<GatewayEnvelope<T>, EnvelopeError> {
        GatewayEnvelope::parse(&self.response_body)
    }
}

/// A decoded envelope together with the exchange that produced it.
#[derive(Debug, Clone)]
pub struct GatewayReply<T> {
    pub exchange: GatewayExchange,
    pub envelope: GatewayEnvelope<T>,
}
