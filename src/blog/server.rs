use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::access::DefaultAccessPolicy;
use super::api::{self, AppState};
use super::db::{DbHandle, EDITOR_TYPE_SETTING, SoloDb};
use super::page_service::DEFAULT_EDITOR_TYPE;

/// Configuration for the console server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    /// Seeds the editor type preference on first start.
    pub editor_type: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: PathBuf::from("solo.db"),
            dev_mode: false,
            editor_type: DEFAULT_EDITOR_TYPE.to_string(),
        }
    }
}

/// Build the full application router: console API, public comment
/// endpoints and a JSON 404 fallback.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({"sc": false, "msg": "Not found"})),
    )
}

/// Open the database at `config.db_path`, creating its directory, and seed
/// the preferences the services read.
pub fn open_database(config: &ServerConfig) -> Result<SoloDb> {
    if let Some(parent) = config
        .db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = SoloDb::new(&config.db_path).context("Failed to initialize blog database")?;
    db.seed_setting(EDITOR_TYPE_SETTING, &config.editor_type)?;
    Ok(db)
}

/// Start the console server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_database(&config)?;
    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        access: Arc::new(DefaultAccessPolicy),
    });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { config.host.as_str() };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, db = %config.db_path.display(), "Solo console listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
