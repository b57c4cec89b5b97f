//! State endpoint: the durable store behind the `http` backend.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/state` | Stored snapshot, or `{properties: [], annotations: {}}` |
//! | `POST` | `/api/state` | Overwrite the snapshot; returns `{success, savedAt}` |
//! | `GET`  | `/api/export?annotator=` | Annotated export of the stored state |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing field `annotations`" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! The last POST wins; there is no field-level merge.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use tracewriter_core::export::ExportOptions;
use tracewriter_core::store::{Snapshot, SnapshotStore};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn SnapshotStore>,
    annotator: String,
}

impl AppState {
    /// `annotator` is the export attribution used when a request names none.
    pub fn new(store: Arc<dyn SnapshotStore>, annotator: impl Into<String>) -> Self {
        Self {
            store,
            annotator: annotator.into(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/state", get(handle_get_state).post(handle_save_state))
        .route("/api/export", get(handle_export))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the SQLite-backed state endpoint on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(config).await?;
    let app = build_router(AppState::new(Arc::new(store), &config.export.annotator));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, db = %config.db.path.display(), "state endpoint listening");
    println!("State endpoint listening on http://{}", config.server.bind);
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
    code: String,
    message: String,
}

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    let message = format!("{:#}", err);
    error!(error = %message, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message,
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

// ============ GET /api/state ============

async fn handle_get_state(State(state): State<AppState>) -> Result<Json<Snapshot>, AppError> {
    let snapshot = state.store.load().await.map_err(internal)?;
    Ok(Json(snapshot))
}

// ============ POST /api/state ============

/// Body of `POST /api/state`. Both fields must be present.
#[derive(Deserialize)]
struct SaveRequest {
    properties: Vec<Value>,
    annotations: BTreeMap<String, String>,
}

/// Acknowledgement of `POST /api/state`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

async fn handle_save_state(
    State(state): State<AppState>,
    body: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, AppError> {
    let Json(request) = body.map_err(|rejection| bad_request(rejection.body_text()))?;

    let snapshot = Snapshot {
        properties: request.properties,
        annotations: request.annotations,
    };
    let receipt = state.store.save(&snapshot).await.map_err(internal)?;

    Ok(Json(SaveResponse {
        success: true,
        saved_at: receipt.saved_at,
    }))
}

// ============ GET /api/export ============

#[derive(Deserialize)]
struct ExportQuery {
    annotator: Option<String>,
}

async fn handle_export(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let annotator = query.annotator.unwrap_or_else(|| state.annotator.clone());
    if annotator.trim().is_empty() {
        return Err(bad_request("annotator must not be empty"));
    }

    let snapshot = state.store.load().await.map_err(internal)?;
    let restored = snapshot
        .decode()
        .map_err(|e| internal(anyhow::Error::new(e).context("stored state does not decode")))?;

    let options = ExportOptions::now(annotator);
    let export = tracewriter_core::export::synthesize(&restored.hierarchy, &restored.annotations, &options);
    Ok(Json(export).into_response())
}
