//! The HTTP seam under [`GatewayClient`](super::GatewayClient).
//!
//! Requests and responses are fully buffered strings so the caller can log
//! and persist both sides of the exchange without re-reading a stream.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayHttpRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl GatewayHttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayHttpResponse {
    pub status: u16,
    pub body: String,
}

/// Executes one buffered HTTP exchange.
///
/// Any HTTP status is a successful exchange; only failures to talk to the
/// gateway at all are errors.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn execute(&self, request: GatewayHttpRequest) -> Result<GatewayHttpResponse, ClientError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Transport with a whole-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl GatewayTransport for ReqwestTransport {
    async fn execute(&self, request: GatewayHttpRequest) -> Result<GatewayHttpResponse, ClientError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(request.url),
            HttpMethod::Post => self.http.post(request.url),
        };
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(GatewayHttpResponse { status, body })
    }
}
