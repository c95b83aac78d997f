//! API Service - Public API for the COVID-19 bulletin
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /resultados - Latest summary with its municipalities
//! - POST /importacao - Download and import the current bulletin

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use collector::{FileSource, FtpConfig, FtpSource};
use importer::{
    import_data, latest_results, publication_label, ImportError, ImportOutcome, PgSummaryStore,
    StoreConfig, SummaryStore,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    store: Arc<dyn SummaryStore>,
    source: Arc<dyn FileSource>,
    /// Where each downloaded bulletin is kept before import
    raw_dir: Option<PathBuf>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn empty_object() -> Response {
    Json(serde_json::json!({})).into_response()
}

fn error_response(error: &ImportError) -> Response {
    let status = match error {
        e if e.is_bad_data() => StatusCode::BAD_REQUEST,
        ImportError::Transfer(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    } else {
        log::warn!("Rejected upstream data: {}", error);
    }

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn resultados_handler(State(state): State<Arc<AppState>>) -> Response {
    match latest_results(state.store.as_ref()).await {
        Ok(Some(results)) => Json(results).into_response(),
        Ok(None) => empty_object(),
        Err(e) => error_response(&e),
    }
}

async fn importacao_handler(State(state): State<Arc<AppState>>) -> Response {
    let raw_dir = state.raw_dir.as_deref();
    match import_data(state.source.as_ref(), state.store.as_ref(), raw_dir).await {
        Ok(ImportOutcome::Imported(stored)) => Json(stored).into_response(),
        Ok(ImportOutcome::AlreadyImported { publicacao }) => {
            log::info!(
                "Publication {} already imported",
                publication_label(publicacao)
            );
            empty_object()
        }
        Err(e) => error_response(&e),
    }
}

fn router(state: Arc<AppState>) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/resultados", get(resultados_handler))
        .route("/importacao", post(importacao_handler))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let db_url = std::env::var("DB_URL").context("DB_URL env var missing")?;
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== COVID-19 Bulletin API ===");
    println!("Connecting to database...");

    let store = PgSummaryStore::connect(&db_url, StoreConfig::from_env()?)
        .await
        .context("Failed to connect to database")?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare summary tables")?;

    println!("Database connected");

    let ftp = FtpConfig::from_env()?;
    let state = Arc::new(AppState {
        store: Arc::new(store),
        raw_dir: Some(ftp.raw_fs_dir.clone()),
        source: Arc::new(FtpSource::new(ftp)),
    });

    let app = router(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET  /health");
    println!("  GET  /resultados");
    println!("  POST /importacao");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
