//! Axum server setup and router configuration.

use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use acqlink_sdk::objects::WebhookQuery;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/public/webhook", get(gateway_webhook))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Gateway payment notification.
///
/// Callbacks without the routing fields are acknowledged and dropped so the
/// gateway does not keep retrying them. Otherwise 200 means applied and 400
/// means rejected.
async fn gateway_webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
) -> StatusCode {
    if !query.is_routable() {
        tracing::debug!(query = ?query, "Ignoring webhook without routing fields");
        return StatusCode::OK;
    }
    if state.webhooks.process_webhook(query.into_reply()).await {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    }
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
