//! Readmit Server - Main entry point

use anyhow::{Context, Result};
use readmit_common::logging::{init_logging, LogConfig};
use readmit_etl::{PgWarehouse, Pipeline};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{info, warn};

use readmit_server::{
    api,
    config::{Config, DatabaseConfig},
    services::Services,
    state::AppState,
};

/// Longest pause after a shutdown signal before the process exits
const MAX_DRAIN_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // LOG_* variables override these
    let log_config = LogConfig::builder()
        .log_file_prefix("readmit-server")
        .filter_directives("readmit_server=debug,readmit_etl=info,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;
    init_logging(&log_config)?;

    let config = Config::load()?;
    info!(host = %config.server.host, port = config.server.port, "Starting readmit server");

    let pool = connect(&config.database).await?;

    let warehouse = Arc::new(PgWarehouse::new(pool.clone()));
    let pipeline = Arc::new(Pipeline::new(config.pipeline.pipeline_config(), warehouse));
    info!(
        destination = %pipeline.config().destination,
        batch_size = pipeline.config().batch_size,
        "Upload pipeline ready"
    );

    let services = Services::from_config(&config.services)?;
    let app = api::router(AppState::new(pool, pipeline, services), &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("READMIT_HOST/READMIT_PORT do not form a socket address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Opens the pool and brings the schema up to date
async fn connect(database: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(Duration::from_secs(database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(database.idle_timeout_secs))
        .connect(&database.url)
        .await
        .context("Failed to connect to the warehouse")?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    info!(max_connections = database.max_connections, "Warehouse connected and migrated");
    Ok(pool)
}

/// Resolves on Ctrl+C or SIGTERM, then gives in-flight uploads a moment to finish
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let which = tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "sigterm",
    };

    let drain = timeout_secs.min(MAX_DRAIN_SECS);
    info!(signal = which, drain_secs = drain, "Shutting down");
    tokio::time::sleep(Duration::from_secs(drain)).await;
}
