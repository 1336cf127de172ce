//! HTTP surface: voice listing, synthesis, history, and the browser UI.

use crate::backends::{BackendRegistry, Voice};
use crate::catalog::VoiceCatalog;
use crate::config_loader::Settings;
use crate::dispatcher::{Dispatcher, FailureKind, SynthesisRequest, SynthesisResult};
use crate::error::PersistenceError;
use crate::history::{HistoryEntry, HistoryRecord, HistoryStore};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub catalog: Arc<VoiceCatalog>,
    pub history: Arc<HistoryStore>,
    pub static_dir: Arc<str>,
}

impl AppState {
    /// Opens the history store and prepares the output directory.
    pub fn from_settings(
        settings: &Settings,
        registry: Arc<BackendRegistry>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let dispatcher = Dispatcher::from_settings(registry.clone(), settings)?;
        let catalog = VoiceCatalog::new(
            registry,
            Duration::from_secs(settings.adapter_timeout_secs),
        );
        if let Some(parent) = Path::new(&settings.history_db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let history = HistoryStore::open(
            Path::new(&settings.history_db_path),
            settings.history_default_limit,
            settings.history_max_limit,
        )?;

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            catalog: Arc::new(catalog),
            history: Arc::new(history),
            static_dir: Arc::from(settings.static_dir.as_str()),
        })
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let audio_dir = ServeDir::new(state.dispatcher.output_dir());
    let static_dir = ServeDir::new(state.static_dir.as_ref());

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/voices", get(list_voices))
        .route("/api/synthesize", post(synthesize))
        .route("/api/history", get(list_history))
        .nest_service("/audio", audio_dir)
        .nest_service("/static", static_dir)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// History write failure; the one error that becomes a 500.
pub struct ApiError(PersistenceError);

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("Failed to persist history: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub history_id: u64,
}

impl SynthesizeResponse {
    fn new(result: &SynthesisResult, history_id: u64) -> Self {
        let audio_url = result
            .audio_file_path()
            .and_then(|p| p.file_name())
            .map(|name| format!("/audio/{}", name.to_string_lossy()));

        Self {
            success: result.success(),
            audio_file_path: result
                .audio_file_path()
                .map(|p| p.to_string_lossy().into_owned()),
            audio_url,
            duration: result.duration_seconds(),
            message: result.message(),
            failure_kind: result.failure_kind(),
            history_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "engines": state.dispatcher.registry().engines(),
    }))
}

async fn list_voices(State(state): State<AppState>) -> Json<Vec<Voice>> {
    Json(state.catalog.list_voices().await)
}

/// The attempt is recorded before the response goes out, whatever the outcome.
async fn synthesize(
    State(state): State<AppState>,
    Json(request): Json<SynthesisRequest>,
) -> Result<(StatusCode, Json<SynthesizeResponse>), ApiError> {
    info!("Received synthesize request for engine '{}'", request.engine);

    let result = state.dispatcher.synthesize(&request).await;
    let record = state
        .history
        .record(HistoryEntry::from_attempt(&request.text, &result))
        .await?;

    let status = match result.failure_kind() {
        Some(kind) if kind.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    Ok((status, Json(SynthesizeResponse::new(&result, record.id))))
}

async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    Ok(Json(state.history.list_recent(query.limit)?))
}
