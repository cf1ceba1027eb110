//! acqlink server
//!
//! Runs the payment status reconciliation worker and the balance updater,
//! and serves the gateway webhook endpoint.

mod config;
mod server;
mod shutdown;
mod state;

use acqlink_core::config::ConfigStore;
use acqlink_core::events::balance_event_channel;
use acqlink_core::framework::DatabaseProcessor;
use acqlink_core::payments::{GatewayQueryService, WebhookProcessor};
use acqlink_core::processors::{BalanceUpdater, PaymentStatusTask, TaskWorker};
use acqlink_sdk::client::{GatewayClient, ReqwestTransport};
use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// acqlink - acquiring gateway integration and payment reconciliation
#[derive(Parser, Debug)]
#[command(name = "acqlink-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./acqlink.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    tracing::info!("Starting acqlink-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(loaded_config.database.max_connections)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let db = Arc::new(DatabaseProcessor::new(db_pool.clone()));
    let transport = ReqwestTransport::with_timeout(loaded_config.gateway.timeout)?;
    let client = GatewayClient::new(Arc::new(transport));

    let (balance_tx, balance_rx) = balance_event_channel();
    let query = Arc::new(
        GatewayQueryService::new(db.clone(), client).with_balance_events(balance_tx.clone()),
    );

    // Processors stop on this signal.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_config = ConfigStore::new(loaded_config.worker.clone());

    let status_task = Arc::new(PaymentStatusTask::new(
        db.clone(),
        db.clone(),
        db.clone(),
        query.clone(),
    ));
    let worker_handle = tokio::spawn(
        TaskWorker::new(db.clone(), status_task).run(shutdown_rx.clone(), worker_config.clone()),
    );
    let balance_handle = tokio::spawn(
        BalanceUpdater::new(db.clone(), db.clone(), query).run(shutdown_rx, balance_rx),
    );

    let webhooks = WebhookProcessor::new(db.clone(), db).with_balance_events(balance_tx);
    let state = AppState::new(webhooks);

    let reload_notify = spawn_config_reload_handler(config_loader, worker_config);

    let router = build_router(state);
    let listen_addr = loaded_config.server.listen;
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    tracing::info!("Stopping processors...");
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    for (name, handle) in [("TaskWorker", worker_handle), ("BalanceUpdater", balance_handle)] {
        if let Err(e) = handle.await {
            tracing::error!("{} terminated abnormally: {}", name, e);
        }
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
