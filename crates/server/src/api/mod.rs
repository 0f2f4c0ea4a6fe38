//! # HTTP API
//!
//! Axum routes under `/api/ghostwriter`, shared state and error mapping.

pub mod ghostwriter;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ghostwriter_core::config::{Credentials, GhostwriterConfig};
use ghostwriter_core::pipeline::PipelineEvent;
use ghostwriter_core::style::StyleGuideStore;
use ghostwriter_core::GhostwriterError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use utoipa::{OpenApi, ToSchema};

/// Application state
pub struct AppState {
    pub config: GhostwriterConfig,
    /// Server-side secrets; a request never supplies these
    pub credentials: Credentials,
    pub styles: StyleGuideStore,
    /// Events of every run started through the API
    pub event_tx: broadcast::Sender<PipelineEvent>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub async fn new(
        config: GhostwriterConfig,
        credentials: Credentials,
    ) -> anyhow::Result<SharedState> {
        let styles = StyleGuideStore::load(config.style_guide_dir.as_deref()).await?;
        let (event_tx, _) = broadcast::channel(256);
        Ok(Arc::new(Self {
            config,
            credentials,
            styles,
            event_tx,
        }))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

/// Error body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl ApiError {
    /// The server cannot build a pipeline (missing credentials, bad server config)
    pub fn unavailable(err: GhostwriterError) -> Self {
        tracing::error!("Pipeline unavailable: {}", err);
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: err.to_string(),
        }
    }
}

impl From<GhostwriterError> for ApiError {
    fn from(err: GhostwriterError) -> Self {
        let status = match &err {
            GhostwriterError::Config(_) => StatusCode::BAD_REQUEST,
            GhostwriterError::Session(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ghostwriter API",
        version = "0.1.0",
        description = "Cited research reports from a multi-stage LLM pipeline"
    ),
    paths(
        ghostwriter::generate,
        ghostwriter::session_status,
        ghostwriter::session_report,
        ghostwriter::list_sessions,
        ghostwriter::list_style_guides,
    ),
    components(schemas(
        ApiResponse,
        ghostwriter::GenerateRequest,
        ghostwriter::GenerateResponse,
        ghostwriter::SessionStatusResponse,
        ghostwriter::ReportResponse,
        ghostwriter::SessionsResponse,
        ghostwriter::StyleGuideInfo,
        ghostwriter::StyleGuidesResponse,
    )),
    tags((name = "ghostwriter", description = "Report generation and session inspection"))
)]
struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    let doc = ApiDoc::openapi().to_json().unwrap_or_default();
    ([(header::CONTENT_TYPE, "application/json")], doc)
}

pub fn router(state: SharedState) -> Router {
    let api = ghostwriter::ghostwriter_routes().route("/openapi.json", get(serve_openapi));
    Router::new()
        .nest("/api/ghostwriter", api)
        .with_state(state)
}
