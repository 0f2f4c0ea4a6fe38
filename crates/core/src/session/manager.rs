//! # Session Manager
//!
//! A session is one pipeline run's working directory. It holds one
//! numbered subdirectory per executed stage, a `metadata.json` and a
//! `transcript.txt` run log. Stage directories are created lazily, so the
//! set of subdirectories always mirrors the stages that actually ran.
//!
//! ```text
//! <workspace_root>/session_20250101_120000_123/
//!   metadata.json
//!   transcript.txt
//!   checkpoint_stage_1.json
//!   00_research/source_01.md
//!   01_draft/initial_draft.md
//!   ...
//! ```

use super::io;
use super::layout::StageId;
use crate::error::{GhostwriterError, Result};
use chrono::{DateTime, Local, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const METADATA_FILE: &str = "metadata.json";
const TRANSCRIPT_FILE: &str = "transcript.txt";

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initialized,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Initialized => "initialized",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Contents of `metadata.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub topic: String,
    pub style_guide: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Error message of a failed run
    #[serde(default)]
    pub error: Option<String>,
}

/// Checkpoint written after each stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<T> {
    pub stage: String,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

/// Creates, loads and lists sessions below a workspace root
#[derive(Debug, Clone)]
pub struct SessionManager {
    workspace_root: PathBuf,
}

impl SessionManager {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Create a new session with a timestamp-derived id
    pub async fn create_session(&self, topic: &str, style_guide: &str) -> Result<Session> {
        fs::create_dir_all(&self.workspace_root)
            .await
            .map_err(|e| GhostwriterError::io(&self.workspace_root, e))?;

        let base_id = format!("session_{}", Local::now().format("%Y%m%d_%H%M%S_%3f"));
        let mut session_id = base_id.clone();
        let mut attempt = 0u32;

        // create_dir (not create_dir_all) so two runs in the same millisecond
        // never share a directory
        let dir = loop {
            let candidate = self.workspace_root.join(&session_id);
            match fs::create_dir(&candidate).await {
                Ok(()) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                    session_id = format!("{}_{}", base_id, attempt);
                }
                Err(e) => return Err(GhostwriterError::io(&candidate, e)),
            }
        };

        let session = Session {
            id: session_id.clone(),
            dir,
        };

        let metadata = SessionMetadata {
            session_id,
            topic: topic.to_string(),
            style_guide: style_guide.to_string(),
            created_at: Utc::now(),
            status: SessionStatus::Initialized,
            current_stage: None,
            last_updated: None,
            error: None,
        };
        session.save_metadata(&metadata).await?;

        session.log(&format!("Session created: {}", session.id)).await;
        session.log(&format!("Topic: {}", topic)).await;
        session.log(&format!("Style guide: {}", style_guide)).await;

        tracing::info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Open an existing session
    pub async fn load_session(&self, session_id: &str) -> Result<Session> {
        if session_id.is_empty()
            || session_id.contains('/')
            || session_id.contains('\\')
            || session_id.contains("..")
        {
            return Err(GhostwriterError::Session(format!(
                "Invalid session id: {}",
                session_id
            )));
        }

        let dir = self.workspace_root.join(session_id);
        if !io::exists(dir.join(METADATA_FILE)).await {
            return Err(GhostwriterError::Session(format!(
                "Session not found: {}",
                session_id
            )));
        }

        Ok(Session {
            id: session_id.to_string(),
            dir,
        })
    }

    /// All session ids in the workspace, oldest first
    pub async fn list_sessions(&self) -> Result<Vec<String>> {
        let dirs = io::list_dirs(&self.workspace_root).await?;
        Ok(dirs
            .iter()
            .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
            .filter(|name| name.starts_with("session_"))
            .collect())
    }
}

/// Handle to one session directory.
///
/// Cheap to clone; fan-out tasks each hold their own copy and write to
/// distinct files.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    dir: PathBuf,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a stage directory, without creating it
    pub fn stage_path(&self, stage: StageId) -> PathBuf {
        self.dir.join(stage.dir_name())
    }

    /// Path of a stage directory, created on first use
    pub async fn stage_dir(&self, stage: StageId) -> Result<PathBuf> {
        let path = self.stage_path(stage);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| GhostwriterError::io(&path, e))?;
        Ok(path)
    }

    /// Stages whose directory exists, in pipeline order
    pub async fn executed_stages(&self) -> Result<Vec<StageId>> {
        let dirs = io::list_dirs(&self.dir).await?;
        let mut stages: Vec<StageId> = dirs
            .iter()
            .filter_map(|d| d.file_name())
            .filter_map(|n| StageId::from_dir_name(&n.to_string_lossy()))
            .collect();
        stages.sort();
        Ok(stages)
    }

    pub async fn write_text(&self, stage: StageId, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.stage_dir(stage).await?.join(name);
        io::write_text(&path, content).await?;
        self.log(&format!("Saved {}/{}", stage.dir_name(), name)).await;
        Ok(path)
    }

    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        stage: StageId,
        name: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let path = self.stage_dir(stage).await?.join(name);
        io::write_json(&path, value).await?;
        self.log(&format!("Saved {}/{}", stage.dir_name(), name)).await;
        Ok(path)
    }

    pub async fn read_text(&self, stage: StageId, name: &str) -> Result<String> {
        io::read_text(self.stage_path(stage).join(name)).await
    }

    pub async fn read_json<T: DeserializeOwned>(&self, stage: StageId, name: &str) -> Result<T> {
        io::read_json(self.stage_path(stage).join(name)).await
    }

    /// Whether a stage artifact exists
    pub async fn has_artifact(&self, stage: StageId, name: &str) -> bool {
        io::exists(self.stage_path(stage).join(name)).await
    }

    /// Append a timestamped line to `transcript.txt`.
    ///
    /// Transcript failures are logged and otherwise ignored.
    pub async fn log(&self, message: &str) {
        let line = format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        let path = self.dir.join(TRANSCRIPT_FILE);

        let result = async {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %path.display(), "Failed to append transcript: {}", e);
        }
    }

    pub async fn transcript(&self) -> Result<String> {
        io::read_text(self.dir.join(TRANSCRIPT_FILE)).await
    }

    pub async fn metadata(&self) -> Result<SessionMetadata> {
        io::read_json(self.dir.join(METADATA_FILE)).await
    }

    async fn save_metadata(&self, metadata: &SessionMetadata) -> Result<()> {
        io::write_json(self.dir.join(METADATA_FILE), metadata).await
    }

    /// Update status (and optionally the current stage) in `metadata.json`
    pub async fn update_status(&self, status: SessionStatus, stage: Option<StageId>) -> Result<()> {
        let mut metadata = self.metadata().await?;
        metadata.status = status;
        metadata.last_updated = Some(Utc::now());
        if let Some(stage) = stage {
            metadata.current_stage = Some(stage.status_label());
        }
        self.save_metadata(&metadata).await
    }

    /// Mark the session failed, recording the error
    pub async fn mark_failed(&self, error: &str) -> Result<()> {
        let mut metadata = self.metadata().await?;
        metadata.status = SessionStatus::Failed;
        metadata.last_updated = Some(Utc::now());
        metadata.error = Some(error.to_string());
        self.save_metadata(&metadata).await
    }

    /// Save `checkpoint_<label>.json` at the session root
    pub async fn checkpoint<T: Serialize>(&self, label: &str, data: &T) -> Result<()> {
        let checkpoint = Checkpoint {
            stage: label.to_string(),
            timestamp: Utc::now(),
            data,
        };
        io::write_json(self.dir.join(format!("checkpoint_{}.json", label)), &checkpoint).await?;
        self.log(&format!("Checkpoint saved: {}", label)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_session_writes_metadata_and_transcript() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(tmp.path());

        let session = manager
            .create_session("DeFi yields on Stellar", "defi_report")
            .await
            .unwrap();

        assert!(session.id().starts_with("session_"));
        let metadata = session.metadata().await.unwrap();
        assert_eq!(metadata.topic, "DeFi yields on Stellar");
        assert_eq!(metadata.style_guide, "defi_report");
        assert_eq!(metadata.status, SessionStatus::Initialized);

        let transcript = session.transcript().await.unwrap();
        assert!(transcript.contains("Session created"));
        assert!(transcript.contains("Topic: DeFi yields on Stellar"));
    }

    #[tokio::test]
    async fn test_stage_dirs_are_created_lazily() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(tmp.path());
        let session = manager.create_session("topic", "technical").await.unwrap();

        assert!(session.executed_stages().await.unwrap().is_empty());

        session
            .write_text(StageId::Draft, "initial_draft.md", "# Draft")
            .await
            .unwrap();
        session.stage_dir(StageId::Research).await.unwrap();

        assert_eq!(
            session.executed_stages().await.unwrap(),
            vec![StageId::Research, StageId::Draft]
        );
        assert_eq!(
            session.read_text(StageId::Draft, "initial_draft.md").await.unwrap(),
            "# Draft"
        );
    }

    #[tokio::test]
    async fn test_sessions_created_back_to_back_are_distinct() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(tmp.path());

        let a = manager.create_session("a", "technical").await.unwrap();
        let b = manager.create_session("b", "technical").await.unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(manager.list_sessions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_status_and_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(tmp.path());
        let session = manager.create_session("topic", "technical").await.unwrap();

        session
            .update_status(SessionStatus::Running, Some(StageId::Verify))
            .await
            .unwrap();
        let metadata = session.metadata().await.unwrap();
        assert_eq!(metadata.status, SessionStatus::Running);
        assert_eq!(metadata.current_stage.as_deref(), Some("stage_4_verify"));
        assert!(metadata.last_updated.is_some());

        session
            .checkpoint("stage_4", &serde_json::json!({"verification_rate": 0.5}))
            .await
            .unwrap();
        let checkpoint: Checkpoint<serde_json::Value> =
            io::read_json(session.dir().join("checkpoint_stage_4.json"))
                .await
                .unwrap();
        assert_eq!(checkpoint.stage, "stage_4");
        assert_eq!(checkpoint.data["verification_rate"], 0.5);
    }

    #[tokio::test]
    async fn test_load_session() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(tmp.path());
        let created = manager.create_session("topic", "technical").await.unwrap();

        let loaded = manager.load_session(created.id()).await.unwrap();
        assert_eq!(loaded.dir(), created.dir());

        assert!(manager.load_session("session_missing").await.is_err());
        assert!(manager.load_session("../etc").await.is_err());
    }
}
