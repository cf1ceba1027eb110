//! Application state shared across all request handlers.

use acqlink_core::payments::WebhookProcessor;
use std::sync::Arc;

/// Cheap to clone; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub webhooks: Arc<WebhookProcessor>,
}

impl AppState {
    pub fn new(webhooks: WebhookProcessor) -> Self {
        Self {
            webhooks: Arc::new(webhooks),
        }
    }
}
