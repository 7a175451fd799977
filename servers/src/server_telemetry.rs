//! # Road-State Telemetry Hub
//!
//! The production server for the telemetry pipeline. It ingests processed
//! road-state records from mobile agents over HTTP, persists them to
//! PostgreSQL, and republishes each newly stored record in real time to
//! every WebSocket listener subscribed to that record's agent.
//!
//! ## Core Responsibilities:
//! - **Ingestion:** `POST /processed_agent_data/` validates and commits a
//!   batch of records, then fans each one out to its agent's listeners.
//! - **CRUD:** read, list, update, and delete by record id.
//! - **Real-time Egress:** `GET /ws/{agent_id}` upgrades to a WebSocket that
//!   receives every record subsequently created for that agent.
//! - **System Health & Lifecycle:** a `/health` check endpoint, graceful
//!   shutdown on CTRL+C/SIGTERM, and optional TLS termination.
//! - **Configuration:** defaults, JSON config file, environment variables,
//!   and CLI flags, merged in that order.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use lib_common::connections::db_postgres::{Database, PgRecordStore};
use lib_common::core::store::{MemoryStore, RecordStore};

mod telemetry_logic;
use telemetry_logic::{config, http, logger, state::AppState, ws};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::load_config();
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    // --- Storage Selection ---
    // PostgreSQL in production; the in-memory engine for local smoke runs.
    let store: Arc<dyn RecordStore> = if settings.memory_store {
        log::warn!("Running with the in-memory record store; nothing survives a restart.");
        Arc::new(MemoryStore::new())
    } else {
        let database_url = settings
            .database_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required unless --memory-store is set"))?;

        let database = Database::new(&database_url, settings.db_max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;
        database
            .ping()
            .await
            .map_err(|e| anyhow::anyhow!("Database ping failed: {}", e))?;

        let store = PgRecordStore::new(database.pool.clone());
        store
            .ensure_schema()
            .await
            .map_err(|e| anyhow::anyhow!("Schema bootstrap failed: {}", e))?;
        log::info!("Connected to PostgreSQL, schema ready.");
        Arc::new(store)
    };

    let app_state = AppState::new(store);

    // --- Router and Server Construction ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route(
            "/processed_agent_data/",
            get(http::list_records).post(http::create_records),
        )
        .route(
            "/processed_agent_data/{id}",
            get(http::read_record)
                .put(http::update_record)
                .delete(http::delete_record),
        )
        .route("/ws/{agent_id}", get(ws::ws_handler))
        .route("/health", get(http::health_handler))
        .layer(cors)
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    if let (Some(cert_path), Some(key_path)) =
        (settings.tls_cert_path.clone(), settings.tls_key_path.clone())
    {
        // Rustls 0.23+ requires an explicit crypto provider to be installed.
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| anyhow::anyhow!("TLS Configuration Error: {}", e))?;

        log::info!("Telemetry hub listening on https://{}", addr);

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            log::warn!("Shutdown signal received. Closing server gracefully...");
            signal_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls_config)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        log::info!("Telemetry hub listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_signal().await;
                log::warn!("Shutdown signal received. Closing server gracefully...");
            })
            .await?;
    }

    log::info!("Shutdown complete.");
    Ok(())
}

/// Listens for CTRL+C (interrupt) and SIGTERM (terminate) to initiate a
/// graceful shutdown of the server.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
