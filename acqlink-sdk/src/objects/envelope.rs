//! The response envelope wrapping every gateway answer.
//!
//! ```text
//! {
//!   "response": { "statusCode": 200, "message": "OK", "detail": ..., "reason": ... },
//!   "reply" | "client" | "clients": <payload>,
//!   "next": "<continuation token>",
//!   ...anything else
//! }
//! ```
//!
//! The payload key depends on the endpoint, and the gateway sometimes sends a
//! bare string (typically an HTML page) where a JSON object is expected.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::client::ClientDetails;
use super::datetime::lenient_status_code;
use super::payment::PaymentReply;

/// Payload keys in priority order. The first one present wins.
pub const PAYLOAD_KEYS: [&str; 3] = ["reply", "client", "clients"];

/// Errors produced while decoding an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid gateway response json: {0}")]
    Json(#[source] serde_json::Error),

    #[error("gateway response is not a JSON object")]
    NotAnObject,

    #[error("invalid response status block: {0}")]
    Status(#[source] serde_json::Error),

    #[error("invalid `{key}` payload: {source}")]
    Payload {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The `response` status block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMessage {
    #[serde(default, with = "lenient_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GatewayMessage {
    /// One-line summary for error logs.
    pub fn describe(&self) -> String {
        format!(
            "message: {}, details: {}, reason: {}",
            self.message.as_deref().unwrap_or("-"),
            self.detail.as_deref().unwrap_or("-"),
            self.reason.as_deref().unwrap_or("-"),
        )
    }
}

/// Decoded payload slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<T> {
    Structured(T),
    /// The gateway sent a JSON string and `T` has nowhere to keep it.
    RawText(String),
}

impl<T> Payload<T> {
    pub fn structured(&self) -> Option<&T> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::RawText(_) => None,
        }
    }

    pub fn into_structured(self) -> Option<T> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::RawText(_) => None,
        }
    }
}

/// Types that can sit in an envelope's payload slot.
pub trait ReplyPayload: DeserializeOwned {
    /// Decide what to do with a payload that arrived as a bare string.
    fn from_raw_text(text: String) -> Payload<Self> {
        Payload::RawText(text)
    }
}

impl ReplyPayload for PaymentReply {
    fn from_raw_text(text: String) -> Payload<Self> {
        Payload::Structured(PaymentReply {
            html: Some(text),
            ..Default::default()
        })
    }
}

impl ReplyPayload for ClientDetails {}

impl<T: ReplyPayload> ReplyPayload for Vec<T> {}

impl ReplyPayload for Value {}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEnvelope<T> {
    pub response: Option<GatewayMessage>,
    pub reply: Option<Payload<T>>,
    /// Continuation token for paged listings.
    pub next: Option<String>,
    /// Top-level keys this type does not model.
    pub extra: Map<String, Value>,
}

impl<T: ReplyPayload> GatewayEnvelope<T> {
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(text).map_err(EnvelopeError::Json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let response = match map.remove("response") {
            None | Some(Value::Null) => None,
            Some(block) => Some(serde_json::from_value(block).map_err(EnvelopeError::Status)?),
        };

        let mut reply = None;
        let mut claimed = false;
        for key in PAYLOAD_KEYS {
            let Some(value) = map.remove(key) else {
                continue;
            };
            if claimed {
                tracing::debug!(key, "Ignoring lower priority payload key");
                continue;
            }
            claimed = true;
            reply = decode_payload::<T>(key, value)?;
        }

        let next = match map.remove("next") {
            None | Some(Value::Null) => None,
            Some(Value::String(token)) => Some(token),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            response,
            reply,
            next,
            extra: map,
        })
    }
}

impl<T> GatewayEnvelope<T> {
    /// `statusCode` of the status block, `None` when the block is missing.
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status_code)
    }

    /// Structured payload, if any.
    pub fn payload(&self) -> Option<&T> {
        self.reply.as_ref().and_then(Payload::structured)
    }

    pub fn into_payload(self) -> Option<T> {
        self.reply.and_then(Payload::into_structured)
    }

    /// Status block summary, or `Unknown error` without one.
    pub fn describe_error(&self) -> String {
        self.response
            .as_ref()
            .map(GatewayMessage::describe)
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

fn decode_payload<T: ReplyPayload>(
    key: &'static str,
    value: Value,
) -> Result<Option<Payload<T>>, EnvelopeError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(T::from_raw_text(text))),
        other => serde_json::from_value(other)
            .map(|decoded| Some(Payload::Structured(decoded)))
            .map_err(|source| EnvelopeError::Payload { key, source }),
    }
}

impl<'de, T: ReplyPayload> Deserialize<'de> for GatewayEnvelope<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}
