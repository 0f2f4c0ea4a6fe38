//! # Pipeline Events
//!
//! Progress notifications streamed to an optional listener (the CLI
//! progress printer, a future UI). Events never influence control flow.

use crate::session::StageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    PipelineStarted,
    StageStarted,
    StageCompleted,
    StageFailed,
    /// One researcher finished and wrote its sources
    ResearcherCompleted,
    /// One researcher failed (tolerated unless all fail)
    ResearcherFailed,
    /// A verdict was reached for one claim
    ClaimVerified,
    /// A revise/re-verify pass is starting
    RevisionIteration,
    PipelineCompleted,
    PipelineFailed,
}

/// An event in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Session the event belongs to
    pub session_id: String,
    #[serde(default)]
    pub stage: Option<StageId>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind, session_id: &str) -> Self {
        Self {
            id: event_id(),
            timestamp: Utc::now(),
            kind,
            session_id: session_id.to_string(),
            stage: None,
            data: None,
        }
    }

    pub fn with_stage(mut self, stage: StageId) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Add data to the event
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Cloneable handle that forwards events to the listener, if any
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<PipelineEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Send an event; a closed channel is ignored
    pub async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}

fn event_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let event = PipelineEvent::new(PipelineEventKind::StageStarted, "session_1")
            .with_stage(StageId::Verify)
            .with_data(serde_json::json!({"claims": 12}));

        assert_eq!(event.session_id, "session_1");
        assert_eq!(event.stage, Some(StageId::Verify));
        assert_eq!(event.data.unwrap()["claims"], 12);
    }

    #[tokio::test]
    async fn test_sink_forwards_and_tolerates_closed_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(tx);
        sink.emit(PipelineEvent::new(PipelineEventKind::PipelineStarted, "s"))
            .await;
        assert_eq!(
            rx.recv().await.unwrap().kind,
            PipelineEventKind::PipelineStarted
        );

        drop(rx);
        sink.emit(PipelineEvent::new(PipelineEventKind::PipelineFailed, "s"))
            .await;
        EventSink::disabled()
            .emit(PipelineEvent::new(PipelineEventKind::PipelineCompleted, "s"))
            .await;
    }
}
