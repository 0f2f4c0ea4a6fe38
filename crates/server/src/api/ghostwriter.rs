//! # Ghostwriter API
//!
//! Report generation plus read-only views over session directories.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use ghostwriter_core::pipeline::{Ghostwriter, PipelineResult};
use ghostwriter_core::session::{SessionManager, StageId};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use utoipa::ToSchema;

use super::{ApiError, SharedState};

/// Report files in order of preference
const REPORT_FALLBACKS: [(StageId, &str); 3] = [
    (StageId::Style, "final_report.md"),
    (StageId::Revise, "revised_draft.md"),
    (StageId::Draft, "initial_draft.md"),
];

fn default_style_guide() -> String {
    "technical".to_string()
}

fn default_num_researchers() -> usize {
    5
}

fn default_max_revisions() -> u32 {
    3
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Research topic, 10-500 characters
    pub topic: String,
    #[serde(default = "default_style_guide")]
    pub style_guide: String,
    /// Parallel researchers, 1-10
    #[serde(default = "default_num_researchers")]
    pub num_researchers: usize,
    /// Revision passes, 1-5
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
}

impl GenerateRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let len = self.topic.chars().count();
        if !(10..=500).contains(&len) {
            return Err(ApiError::bad_request(format!(
                "topic must be 10-500 characters (got {})",
                len
            )));
        }
        if !(1..=10).contains(&self.num_researchers) {
            return Err(ApiError::bad_request("num_researchers must be 1-10"));
        }
        if !(1..=5).contains(&self.max_revisions) {
            return Err(ApiError::bad_request("max_revisions must be 1-5"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateResponse {
    pub success: bool,
    pub session_id: String,
    pub topic: String,
    pub final_report: Option<String>,
    pub final_report_path: Option<String>,
    pub verification_rate: Option<f64>,
    pub threshold_met: bool,
    pub revision_iterations: u32,
}

impl From<PipelineResult> for GenerateResponse {
    fn from(result: PipelineResult) -> Self {
        Self {
            success: true,
            session_id: result.session_id,
            topic: result.topic,
            final_report: result.final_report,
            final_report_path: result
                .final_report_path
                .map(|p| p.display().to_string()),
            verification_rate: result.verification_rate,
            threshold_met: result.threshold_met,
            revision_iterations: result.revision_iterations,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    pub session_id: String,
    /// initialized, running, completed or failed
    pub status: String,
    pub current_stage: Option<String>,
    pub last_updated: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    pub session_id: String,
    pub content: String,
    pub format: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionsResponse {
    pub sessions: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StyleGuideInfo {
    pub name: String,
    pub description: String,
    pub audience: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StyleGuidesResponse {
    pub style_guides: Vec<StyleGuideInfo>,
}

pub fn ghostwriter_routes() -> Router<SharedState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/session/:id/status", get(session_status))
        .route("/session/:id/report", get(session_report))
        .route("/sessions", get(list_sessions))
        .route("/style-guides", get(list_style_guides))
        .route("/events", get(events))
}

/// Run the full pipeline and return the styled report
#[utoipa::path(
    post,
    path = "/api/ghostwriter/generate",
    tag = "ghostwriter",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Report generated", body = GenerateResponse),
        (status = 400, description = "Invalid request or unknown style guide", body = super::ApiResponse),
        (status = 500, description = "A stage failed", body = super::ApiResponse),
        (status = 503, description = "Server is missing credentials", body = super::ApiResponse)
    )
)]
pub async fn generate(
    State(state): State<SharedState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    req.validate()?;
    state.styles.get(&req.style_guide)?;

    let mut config = state.config.clone();
    config.num_researchers = req.num_researchers;
    config.max_revision_iterations = req.max_revisions;

    let (tx, mut rx) = mpsc::channel(64);
    let ghostwriter = Ghostwriter::from_credentials(config, &state.credentials)
        .map_err(ApiError::unavailable)?
        .with_event_channel(tx);

    let event_tx = state.event_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            // No subscribers is fine
            let _ = event_tx.send(event);
        }
    });

    tracing::info!(topic = %req.topic, style = %req.style_guide, "Generating report");
    let result = ghostwriter.run(&req.topic, &req.style_guide).await?;
    Ok(Json(result.into()))
}

#[utoipa::path(
    get,
    path = "/api/ghostwriter/session/{id}/status",
    tag = "ghostwriter",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 404, description = "Unknown session", body = super::ApiResponse)
    )
)]
pub async fn session_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = SessionManager::new(state.config.workspace_root.clone())
        .load_session(&id)
        .await?;
    let metadata = session.metadata().await?;

    Ok(Json(SessionStatusResponse {
        session_id: metadata.session_id,
        status: metadata.status.as_str().to_string(),
        current_stage: metadata.current_stage,
        last_updated: metadata.last_updated.map(|t| t.to_rfc3339()),
        error: metadata.error,
    }))
}

/// Latest report of a session: styled, else revised, else initial draft
#[utoipa::path(
    get,
    path = "/api/ghostwriter/session/{id}/report",
    tag = "ghostwriter",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Report markdown", body = ReportResponse),
        (status = 404, description = "Unknown session or no report yet", body = super::ApiResponse)
    )
)]
pub async fn session_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ReportResponse>, ApiError> {
    let session = SessionManager::new(state.config.workspace_root.clone())
        .load_session(&id)
        .await?;

    for (stage, name) in REPORT_FALLBACKS {
        if session.has_artifact(stage, name).await {
            let content = session.read_text(stage, name).await?;
            return Ok(Json(ReportResponse {
                session_id: id,
                content,
                format: "markdown".to_string(),
            }));
        }
    }

    Err(ApiError::not_found(format!(
        "Report not found for session: {}",
        id
    )))
}

#[utoipa::path(
    get,
    path = "/api/ghostwriter/sessions",
    tag = "ghostwriter",
    responses((status = 200, description = "Session ids, oldest first", body = SessionsResponse))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let sessions = SessionManager::new(state.config.workspace_root.clone())
        .list_sessions()
        .await?;
    Ok(Json(SessionsResponse {
        total: sessions.len(),
        sessions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/ghostwriter/style-guides",
    tag = "ghostwriter",
    responses((status = 200, description = "Available style guides", body = StyleGuidesResponse))
)]
pub async fn list_style_guides(State(state): State<SharedState>) -> Json<StyleGuidesResponse> {
    Json(StyleGuidesResponse {
        style_guides: state
            .styles
            .list()
            .into_iter()
            .map(|g| StyleGuideInfo {
                name: g.name.clone(),
                description: g.description.clone(),
                audience: g.audience.clone(),
            })
            .collect(),
    })
}

/// SSE stream of pipeline events with a heartbeat
async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match tokio::time::timeout(Duration::from_secs(15), rx.recv()).await {
            Ok(Ok(event)) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                Some((Ok(Event::default().data(json)), rx))
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => Some((
                Ok(Event::default().comment(format!("lagged {}", skipped))),
                rx,
            )),
            Ok(Err(broadcast::error::RecvError::Closed)) => None,
            Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
