//! FlashDB HTTP server
//!
//! Serves one FlashDB connection over a small JSON API, for local use and
//! testing. Configuration comes from `config.yaml` (path in `FLASHDB_CONFIG`)
//! with environment overrides; see `config.rs`.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

mod config;
mod logging;
mod metrics;
mod routes;

use config::Config;
use metrics::{Metrics, MetricsLogger};
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("FLASHDB_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    config.apply_logging_env();
    logging::init();

    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
    let options = config
        .database
        .connection_options()?
        .with_logger(Arc::new(MetricsLogger::new(Arc::clone(&metrics))));

    let conn = flashdb::connect(options).context("failed to open database")?;
    info!(engine = conn.engine_name(), "database ready");

    let state = AppState::new(conn, metrics);
    let shared = state.connection();
    let app = routes::router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("FlashDB server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Roll back whatever a client left open
    let mut conn = shared.lock().await;
    if !conn.is_released() {
        conn.release()?;
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
