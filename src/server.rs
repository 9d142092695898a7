//! JSON HTTP API.
//!
//! Exposes ingestion and theme reads to the serving layer:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingest?feed_url=...` | Ingest one feed, returns counts |
//! | `GET`  | `/themes` | List themes with document counts |
//! | `GET`  | `/themes/{id}` | Chronological timeline of one theme |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses use the same JSON shape:
//!
//! ```json
//! { "error": { "code": "feed_parse_error", "message": "invalid feed: ..." } }
//! ```
//!
//! Error codes: `feed_parse_error` (400), `bad_request` (400),
//! `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::embedding::{self, Embedder};
use crate::error::PipelineError;
use crate::ingest;
use crate::migrate;
use crate::models::IngestSummary;
use crate::store;
use crate::store::{ThemeSummary, ThemeTimeline};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    embedder: Arc<dyn Embedder>,
}

/// Starts the HTTP server.
///
/// Ensures the schema exists and preloads the embedding model before
/// binding — a model that cannot load is fatal here, not on the first
/// request. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let embedder = embedding::create_embedder(&config.embedding)?;
    embedder.preload().await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        embedder,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingest", post(handle_ingest))
        .route("/themes", get(handle_list_themes))
        .route("/themes/{id}", get(handle_theme_timeline))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"feed_parse_error"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map pipeline errors to HTTP responses. Per-document errors never reach
/// this point — the pipeline absorbs them into the skipped count — so
/// anything other than a parse failure or missing theme is a 500.
fn classify_pipeline_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::FeedParse(_) => AppError {
            status: StatusCode::BAD_REQUEST,
            code: "feed_parse_error".to_string(),
            message: err.to_string(),
        },
        PipelineError::ThemeNotFound(_) => not_found(err.to_string()),
        _ => internal(err.to_string()),
    }
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestParams {
    feed_url: String,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
) -> Result<Json<IngestSummary>, AppError> {
    let summary = ingest::ingest_feed(
        &state.config,
        &state.pool,
        state.embedder.clone(),
        &params.feed_url,
    )
    .await
    .map_err(classify_pipeline_error)?;

    Ok(Json(summary))
}

// ============ GET /themes ============

async fn handle_list_themes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ThemeSummary>>, AppError> {
    let themes = store::list_themes(&state.pool)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(themes))
}

// ============ GET /themes/{id} ============

async fn handle_theme_timeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ThemeTimeline>, AppError> {
    let timeline = store::theme_timeline(&state.pool, id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    match timeline {
        Some(timeline) => Ok(Json(timeline)),
        None => Err(classify_pipeline_error(PipelineError::ThemeNotFound(id))),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
