//! Payment services: placement, gateway queries, webhooks and the reply
//! merge they share.

pub mod merge;
pub mod placement;
pub mod query;
pub mod webhook;

pub use merge::{MergeReport, apply_reply, status_from_reply};
pub use placement::{PaymentPlacement, PlacementError, describe_status};
pub use query::{GatewayQueryService, PaymentQueryService, QueryError};
pub use webhook::WebhookProcessor;
