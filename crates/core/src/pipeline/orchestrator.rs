//! # Pipeline Orchestrator
//!
//! Runs the eight stages in order against one session:
//!
//! ```text
//! research → draft → extract → verify → critique
//!          → [revise → re-verify]×n → style
//! ```
//!
//! The revise/re-verify pair always runs once and repeats while the pass
//! rate stays below the threshold, up to `max_revision_iterations` passes.
//! Styling runs on loop exit whatever the final rate. The first stage error
//! aborts the run, marks the session failed and leaves earlier artifacts in
//! place.

use crate::claims::VerificationReport;
use crate::config::{Credentials, GhostwriterConfig};
use crate::error::Result;
use crate::llm::{model_from_config, LanguageModel};
use crate::session::{Session, SessionManager, SessionStatus, StageId};
use crate::stages::{critique, draft, extract, research, revise, style, verify, StageContext};
use crate::style::{StyleGuide, StyleGuideStore};
use crate::tools::{HttpFetcher, SourceFetcher, SubprocessSearch, TavilySearch, WebSearch};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::{EventSink, PipelineEvent, PipelineEventKind};
use super::revision::RevisionLoop;

/// How far a run goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    #[default]
    Full,
    /// Stage 1 only
    Research,
    /// Stages 1 through 3
    ThroughExtraction,
}

/// Terminal artifact of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub session_id: String,
    pub session_dir: PathBuf,
    pub topic: String,
    pub style_guide: String,
    pub scope: RunScope,
    pub total_sources: usize,
    #[serde(default)]
    pub claims_extracted: Option<usize>,
    /// Styled report, present for full runs
    #[serde(default)]
    pub final_report: Option<String>,
    #[serde(default)]
    pub final_report_path: Option<PathBuf>,
    /// Latest pass rate, present once verification ran
    #[serde(default)]
    pub verification_rate: Option<f64>,
    pub threshold_met: bool,
    pub revision_iterations: u32,
    pub stages_completed: Vec<StageId>,
}

/// The Ghostwriter pipeline
pub struct Ghostwriter {
    config: Arc<GhostwriterConfig>,
    sessions: SessionManager,
    llm: Arc<dyn LanguageModel>,
    search: Arc<dyn WebSearch>,
    fetcher: Arc<dyn SourceFetcher>,
    events: EventSink,
}

impl Ghostwriter {
    /// Build a pipeline from explicit backends
    pub fn new(
        config: GhostwriterConfig,
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn WebSearch>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let sessions = SessionManager::new(config.workspace_root.clone());
        Ok(Self {
            config: Arc::new(config),
            sessions,
            llm,
            search,
            fetcher,
            events: EventSink::disabled(),
        })
    }

    /// Build the production backends from the process environment
    pub fn from_env(config: GhostwriterConfig) -> Result<Self> {
        Self::from_credentials(config, &Credentials::from_env())
    }

    /// Build the production backends, failing on missing credentials
    /// before anything touches the network or the workspace
    pub fn from_credentials(config: GhostwriterConfig, credentials: &Credentials) -> Result<Self> {
        config.validate()?;
        let llm = model_from_config(&config, credentials)?;
        let search: Arc<dyn WebSearch> = match &config.search_command {
            Some(command) => Arc::new(SubprocessSearch::from_command_line(command)?),
            None => Arc::new(TavilySearch::new(credentials.tavily_api_key()?)?),
        };
        let fetcher = Arc::new(HttpFetcher::new()?);
        Self::new(config, llm, search, fetcher)
    }

    /// Stream progress events to `tx`
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn config(&self) -> &GhostwriterConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Run all eight stages
    pub async fn run(&self, topic: &str, style_guide: &str) -> Result<PipelineResult> {
        self.run_scope(topic, style_guide, RunScope::Full).await
    }

    #[tracing::instrument(skip(self), fields(session_id = tracing::field::Empty))]
    pub async fn run_scope(
        &self,
        topic: &str,
        style_guide: &str,
        scope: RunScope,
    ) -> Result<PipelineResult> {
        let styles = StyleGuideStore::load(self.config.style_guide_dir.as_deref()).await?;
        let guide = styles.get(style_guide)?.clone();

        let session = self.sessions.create_session(topic, style_guide).await?;
        tracing::Span::current().record("session_id", session.id());

        let ctx = StageContext {
            session: session.clone(),
            config: self.config.clone(),
            llm: self.llm.clone(),
            search: self.search.clone(),
            fetcher: self.fetcher.clone(),
            events: self.events.clone(),
        };

        self.events
            .emit(
                PipelineEvent::new(PipelineEventKind::PipelineStarted, session.id()).with_data(
                    json!({"topic": topic, "style_guide": style_guide, "scope": scope}),
                ),
            )
            .await;
        tracing::info!(%topic, style_guide, ?scope, "Pipeline started");

        match self.execute(&ctx, topic, &guide, scope).await {
            Ok(result) => {
                session.update_status(SessionStatus::Completed, None).await?;
                session
                    .log(&format!(
                        "Pipeline complete ({} stages)",
                        result.stages_completed.len()
                    ))
                    .await;
                self.events
                    .emit(
                        PipelineEvent::new(PipelineEventKind::PipelineCompleted, session.id())
                            .with_data(json!({
                                "verification_rate": result.verification_rate,
                                "threshold_met": result.threshold_met,
                                "revision_iterations": result.revision_iterations,
                            })),
                    )
                    .await;
                tracing::info!(
                    rate = ?result.verification_rate,
                    iterations = result.revision_iterations,
                    "Pipeline complete"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Pipeline failed: {}", e);
                session.log(&format!("Pipeline failed: {}", e)).await;
                if let Err(meta_err) = session.mark_failed(&e.to_string()).await {
                    tracing::warn!("Failed to record failure in metadata: {}", meta_err);
                }
                self.events
                    .emit(
                        PipelineEvent::new(PipelineEventKind::PipelineFailed, session.id())
                            .with_data(json!({"error": e.to_string()})),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        topic: &str,
        guide: &StyleGuide,
        scope: RunScope,
    ) -> Result<PipelineResult> {
        let threshold = self.config.verification_threshold;
        let mut passes = RevisionLoop::new(self.config.max_revision_iterations);
        let mut result = PipelineResult {
            session_id: ctx.session.id().to_string(),
            session_dir: ctx.session.dir().to_path_buf(),
            topic: topic.to_string(),
            style_guide: guide.name.clone(),
            scope,
            total_sources: 0,
            claims_extracted: None,
            final_report: None,
            final_report_path: None,
            verification_rate: None,
            threshold_met: false,
            revision_iterations: 0,
            stages_completed: Vec::new(),
        };

        // Stage 1
        let research = in_stage(ctx, StageId::Research, research::run(ctx, topic)).await?;
        ctx.session.checkpoint("research", &research.summary).await?;
        result.total_sources = research.sources.len();

        if scope == RunScope::Research {
            return finish(ctx, result).await;
        }

        // Stages 2-3
        let initial_draft = in_stage(ctx, StageId::Draft, draft::run(ctx, topic)).await?;
        ctx.session
            .checkpoint("draft", &json!({"chars": initial_draft.len()}))
            .await?;

        let extraction = in_stage(
            ctx,
            StageId::Extract,
            extract::run(ctx, &initial_draft, &research.sources),
        )
        .await?;
        ctx.session
            .checkpoint(
                "extraction",
                &json!({
                    "claims": extraction.claims.len(),
                    "citations": extraction.citations.len(),
                }),
            )
            .await?;
        result.claims_extracted = Some(extraction.claims.len());

        if scope == RunScope::ThroughExtraction {
            return finish(ctx, result).await;
        }

        // Stages 4-5
        let mut report =
            in_stage(ctx, StageId::Verify, verify::run(ctx, &extraction)).await?;
        ctx.session
            .checkpoint("verification", &report_summary(&report))
            .await?;

        let critique = in_stage(
            ctx,
            StageId::Critique,
            critique::run(ctx, &initial_draft, &report),
        )
        .await?;
        ctx.session
            .checkpoint("critique", &json!({"chars": critique.len()}))
            .await?;

        // Stages 6-7, bounded loop
        let mut current_draft = initial_draft;
        loop {
            let iteration = passes.next_pass();
            ctx.emit(
                PipelineEventKind::RevisionIteration,
                StageId::Revise,
                json!({"iteration": iteration, "verification_rate": report.verification_rate}),
            )
            .await;
            tracing::info!(
                iteration,
                rate = report.verification_rate,
                "Starting revision pass"
            );

            current_draft = in_stage(
                ctx,
                StageId::Revise,
                revise::run(ctx, &current_draft, &critique, &report, iteration),
            )
            .await?;

            let (_, latest) = in_stage(
                ctx,
                StageId::ReVerify,
                verify::re_verify(ctx, &current_draft, &research.sources, iteration),
            )
            .await?;
            report = latest;
            ctx.session
                .checkpoint(
                    &format!("revision_iter_{}", iteration),
                    &report_summary(&report),
                )
                .await?;

            if !passes.finish_pass(report.verification_rate, threshold) {
                break;
            }
        }

        if report.threshold_met {
            tracing::info!(rate = report.verification_rate, "Verification threshold met");
        } else {
            tracing::warn!(
                rate = report.verification_rate,
                threshold,
                "Verification threshold not met after {} revision passes",
                passes.completed
            );
        }

        // Stage 8
        let final_report =
            in_stage(ctx, StageId::Style, style::run(ctx, &current_draft, guide)).await?;
        ctx.session
            .checkpoint("style", &json!({"style_guide": guide.name}))
            .await?;

        result.final_report_path = Some(
            ctx.session
                .stage_path(StageId::Style)
                .join(style::FINAL_REPORT_FILE),
        );
        result.final_report = Some(final_report);
        result.verification_rate = Some(report.verification_rate);
        result.threshold_met = report.threshold_met;
        result.revision_iterations = passes.completed;
        finish(ctx, result).await
    }
}

/// Run one stage with status tracking, events and logging.
///
/// The stage directory exists once the stage starts, whether or not it
/// succeeds.
async fn in_stage<T, F>(ctx: &StageContext, stage: StageId, task: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.session.stage_dir(stage).await?;
    ctx.session
        .update_status(SessionStatus::Running, Some(stage))
        .await?;
    ctx.session
        .log(&format!("Stage {}: {}", stage.index() + 1, stage))
        .await;
    ctx.emit(PipelineEventKind::StageStarted, stage, json!({})).await;
    tracing::info!(%stage, "Stage started");

    match task.await {
        Ok(output) => {
            ctx.emit(PipelineEventKind::StageCompleted, stage, json!({})).await;
            tracing::info!(%stage, "Stage completed");
            Ok(output)
        }
        Err(e) => {
            ctx.emit(
                PipelineEventKind::StageFailed,
                stage,
                json!({"error": e.to_string()}),
            )
            .await;
            Err(e)
        }
    }
}

async fn finish(ctx: &StageContext, mut result: PipelineResult) -> Result<PipelineResult> {
    result.stages_completed = ctx.session.executed_stages().await?;
    Ok(result)
}

fn report_summary(report: &VerificationReport) -> serde_json::Value {
    json!({
        "total_claims": report.total_claims,
        "supported_claims": report.supported_claims,
        "verification_rate": report.verification_rate,
        "threshold_met": report.threshold_met,
    })
}

/// Open an existing session for inspection
pub async fn open_session(config: &GhostwriterConfig, session_id: &str) -> Result<Session> {
    SessionManager::new(config.workspace_root.clone())
        .load_session(session_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GhostwriterError;
    use crate::llm::CompletionRequest;
    use crate::session::io;
    use crate::testing::{ScriptedModel, StaticFetcher, StaticSearch};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GOOD_URL: &str = "https://source0.org";

    fn research_reply() -> String {
        json!({"sources": [{
            "url": GOOD_URL,
            "title": "Source 0",
            "date_published": "2025-01-01",
            "source_type": "news",
            "excerpts": "- \"Stellar fees are tiny\"",
            "summary": "Fees are tiny."
        }]})
        .to_string()
    }

    fn extraction_reply(url: &str) -> String {
        json!({
            "claims": [
                {"id": 1, "text": "Stellar fees are tiny", "citation": 1},
                {"id": 2, "text": "Stellar settles in seconds", "citation": 1}
            ],
            "citations": [{"id": 1, "url": url}]
        })
        .to_string()
    }

    /// Answers every prompt of the pipeline; the verifier says `verdict`
    fn pipeline_model(verdict: &'static str, revisions: Arc<AtomicUsize>) -> ScriptedModel {
        ScriptedModel::new(move |request: &CompletionRequest| {
            if request.prompt.contains("Extract every atomic factual claim") {
                return Ok(extraction_reply(GOOD_URL));
            }
            if request.prompt.contains("meticulous fact checker") {
                return Ok(json!({
                    "verdict": verdict,
                    "confidence": 0.9,
                    "reasoning": "checked"
                })
                .to_string());
            }
            match request.stage {
                StageId::Research => Ok(research_reply()),
                StageId::Draft => Ok("# Stellar\n\nFees are tiny [1].".to_string()),
                StageId::Critique => Ok("## Priority Fixes\n1. none".to_string()),
                StageId::Revise => {
                    revisions.fetch_add(1, Ordering::SeqCst);
                    Ok("# Stellar (revised)\n\nFees are tiny [1].".to_string())
                }
                StageId::Style => Ok("# Final report".to_string()),
                other => Err(GhostwriterError::Llm(format!("unexpected stage {}", other))),
            }
        })
    }

    fn pipeline(
        root: &Path,
        configure: impl FnOnce(&mut GhostwriterConfig),
        llm: ScriptedModel,
        fetcher: StaticFetcher,
    ) -> Ghostwriter {
        let mut config = GhostwriterConfig {
            workspace_root: root.to_path_buf(),
            ..Default::default()
        };
        configure(&mut config);
        Ghostwriter::new(
            config,
            Arc::new(llm),
            Arc::new(StaticSearch::with_hits(3)),
            Arc::new(fetcher),
        )
        .unwrap()
    }

    fn good_fetcher() -> StaticFetcher {
        StaticFetcher::default().with_page(GOOD_URL, "Stellar fees are tiny and settle in seconds.")
    }

    #[tokio::test]
    async fn test_full_run_creates_all_stage_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let revisions = Arc::new(AtomicUsize::new(0));
        let gw = pipeline(
            tmp.path(),
            |c| {
                c.num_researchers = 5;
                c.verification_threshold = 0.9;
            },
            pipeline_model("supported", revisions.clone()),
            good_fetcher(),
        );

        let result = gw.run("Stellar DeFi", "defi_report").await.unwrap();
        assert_eq!(result.style_guide, "defi_report");
        assert_eq!(result.stages_completed, StageId::ALL.to_vec());
        assert_eq!(result.total_sources, 5);
        let rate = result.verification_rate.unwrap();
        assert!((0.0..=1.0).contains(&rate));
        assert_eq!(rate, 1.0);
        assert!(result.threshold_met);
        assert_eq!(result.revision_iterations, 1);
        assert_eq!(revisions.load(Ordering::SeqCst), 1);
        assert_eq!(result.final_report.as_deref(), Some("# Final report"));

        let dirs = io::list_dirs(&result.session_dir).await.unwrap();
        assert_eq!(dirs.len(), 8);

        let session = open_session(gw.config(), &result.session_id).await.unwrap();
        let metadata = session.metadata().await.unwrap();
        assert_eq!(metadata.status, SessionStatus::Completed);
        assert!(io::exists(result.session_dir.join("checkpoint_style.json")).await);
    }

    #[tokio::test]
    async fn test_research_only_run() {
        let tmp = tempfile::tempdir().unwrap();
        let gw = pipeline(
            tmp.path(),
            |c| c.num_researchers = 3,
            pipeline_model("supported", Arc::new(AtomicUsize::new(0))),
            good_fetcher(),
        );

        let result = gw
            .run_scope("Stellar DeFi", "technical", RunScope::Research)
            .await
            .unwrap();
        assert_eq!(result.stages_completed, vec![StageId::Research]);
        assert!(result.final_report.is_none());

        let mut sources: Vec<String> = io::list_files(result.session_dir.join("00_research"))
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|n| n.ends_with(".md"))
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["source_01.md", "source_02.md", "source_03.md"]);
        assert_eq!(result.total_sources, 3);
    }

    #[tokio::test]
    async fn test_through_extraction_run() {
        let tmp = tempfile::tempdir().unwrap();
        let gw = pipeline(
            tmp.path(),
            |c| c.num_researchers = 2,
            pipeline_model("supported", Arc::new(AtomicUsize::new(0))),
            good_fetcher(),
        );

        let result = gw
            .run_scope("Stellar", "technical", RunScope::ThroughExtraction)
            .await
            .unwrap();
        assert_eq!(
            result.stages_completed,
            vec![StageId::Research, StageId::Draft, StageId::Extract]
        );
        assert_eq!(result.claims_extracted, Some(2));
        assert!(result.verification_rate.is_none());
    }

    #[tokio::test]
    async fn test_iteration_cap_is_respected() {
        let tmp = tempfile::tempdir().unwrap();
        let revisions = Arc::new(AtomicUsize::new(0));
        let gw = pipeline(
            tmp.path(),
            |c| {
                c.num_researchers = 1;
                c.max_revision_iterations = 2;
            },
            pipeline_model("unsupported", revisions.clone()),
            good_fetcher(),
        );

        let result = gw.run("Stellar", "technical").await.unwrap();
        assert_eq!(result.revision_iterations, 2);
        assert_eq!(revisions.load(Ordering::SeqCst), 2);
        assert!(!result.threshold_met);
        assert_eq!(result.verification_rate, Some(0.0));
        // Threshold miss still produces a styled report
        assert!(result.final_report.is_some());

        let revision_dir = result.session_dir.join("05_revision");
        assert!(io::exists(revision_dir.join("revised_draft_iter_2.md")).await);
        assert!(!io::exists(revision_dir.join("revised_draft_iter_3.md")).await);
    }

    #[tokio::test]
    async fn test_unreachable_sources_never_count_as_supported() {
        let tmp = tempfile::tempdir().unwrap();
        let gw = pipeline(
            tmp.path(),
            |c| {
                c.num_researchers = 1;
                c.max_revision_iterations = 1;
            },
            pipeline_model("supported", Arc::new(AtomicUsize::new(0))),
            StaticFetcher::default(),
        );

        let result = gw.run("Stellar", "technical").await.unwrap();
        assert_eq!(result.verification_rate, Some(0.0));
        assert_eq!(result.revision_iterations, 1);
    }

    #[tokio::test]
    async fn test_stage_error_aborts_and_marks_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|request| match request.stage {
            StageId::Research => Ok(research_reply()),
            _ => Err(GhostwriterError::Llm("model unavailable".into())),
        });
        let gw = pipeline(tmp.path(), |c| c.num_researchers = 2, llm, good_fetcher());

        let err = gw.run("Stellar", "technical").await.unwrap_err();
        assert!(matches!(err, GhostwriterError::Llm(_)));

        let sessions = gw.sessions().list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        let session = gw.sessions().load_session(&sessions[0]).await.unwrap();
        assert_eq!(
            session.executed_stages().await.unwrap(),
            vec![StageId::Research, StageId::Draft]
        );

        let metadata = session.metadata().await.unwrap();
        assert_eq!(metadata.status, SessionStatus::Failed);
        assert!(metadata.error.unwrap().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_verification_error_leaves_dirs_of_started_stages() {
        let tmp = tempfile::tempdir().unwrap();
        let base = pipeline_model("supported", Arc::new(AtomicUsize::new(0)));
        let llm = ScriptedModel::new(move |request| {
            if request.prompt.contains("meticulous fact checker") {
                return Ok("I could not decide".to_string());
            }
            base.reply(request)
        });
        let gw = pipeline(tmp.path(), |c| c.num_researchers = 1, llm, good_fetcher());

        let err = gw.run("Stellar", "technical").await.unwrap_err();
        assert!(matches!(err, GhostwriterError::Parse { stage: StageId::Verify, .. }));

        let sessions = gw.sessions().list_sessions().await.unwrap();
        let session = gw.sessions().load_session(&sessions[0]).await.unwrap();
        assert_eq!(
            session.executed_stages().await.unwrap(),
            vec![StageId::Research, StageId::Draft, StageId::Extract, StageId::Verify]
        );
        assert!(!session.has_artifact(StageId::Verify, "verification_report.json").await);
        assert!(!io::exists(session.dir().join("checkpoint_verification.json")).await);
        assert_eq!(
            session.metadata().await.unwrap().status,
            SessionStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_unknown_style_guide_creates_no_session() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("workspace");
        let gw = pipeline(
            &root,
            |_| {},
            pipeline_model("supported", Arc::new(AtomicUsize::new(0))),
            good_fetcher(),
        );

        let err = gw.run("Stellar", "limerick").await.unwrap_err();
        assert!(err.is_config());
        assert!(!io::exists(&root).await);
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("workspace");
        let config = GhostwriterConfig {
            workspace_root: root.clone(),
            ..Default::default()
        };
        let credentials = Credentials::from_lookup(|_: &str| None);

        let err = Ghostwriter::from_credentials(config, &credentials)
            .err()
            .unwrap();
        assert!(err.is_config());
        assert!(!io::exists(&root).await);
    }

    #[tokio::test]
    async fn test_events_are_streamed() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(256);
        let gw = pipeline(
            tmp.path(),
            |c| c.num_researchers = 1,
            pipeline_model("supported", Arc::new(AtomicUsize::new(0))),
            good_fetcher(),
        )
        .with_event_channel(tx);

        gw.run_scope("Stellar", "technical", RunScope::Research)
            .await
            .unwrap();
        drop(gw);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.first(), Some(&PipelineEventKind::PipelineStarted));
        assert_eq!(kinds.last(), Some(&PipelineEventKind::PipelineCompleted));
        assert!(kinds.contains(&PipelineEventKind::ResearcherCompleted));
    }
}
