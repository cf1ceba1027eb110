pub mod client;
pub mod datetime;
pub mod envelope;
pub mod payment;
pub mod webhook;

pub use client::{BillingAddress, CardDetails, ClientDetails, ValidationError};
pub use envelope::{EnvelopeError, GatewayEnvelope, GatewayMessage, Payload, ReplyPayload};
pub use payment::{CardType, GatewayOutcome, PaymentReply, PaymentRequest};
pub use webhook::{WebhookQuery, WebhookReply};
