//! # Stage 1: Research
//!
//! Parallel researchers, each searching the topic from its own angle and
//! condensing the hits into source summaries. One `source_NN.md` per
//! researcher that found anything.

use super::context::StageContext;
use super::prompts;
use crate::error::{GhostwriterError, Result};
use crate::llm::{parse_structured, Validate};
use crate::pipeline::events::PipelineEventKind;
use crate::pipeline::fanout::{JoinPolicy, TaskGroup};
use crate::session::StageId;
use crate::sources::{format_sources, SourceSummary};
use crate::tools::format_results_markdown;
use serde::{Deserialize, Serialize};
use serde_json::json;

const STAGE: StageId = StageId::Research;
const MAX_SOURCES_PER_RESEARCHER: usize = 5;

/// Research angles, assigned round-robin
pub const ANGLES: [(&str, &str); 6] = [
    ("fundamentals and background", "overview explained"),
    ("recent data and statistics", "latest statistics 2025"),
    ("risks and challenges", "risks challenges security"),
    ("key protocols and players", "top protocols platforms"),
    ("future outlook", "outlook forecast roadmap"),
    ("expert analysis", "analysis report"),
];

#[derive(Debug, Deserialize)]
struct ResearcherReply {
    #[serde(default)]
    sources: Vec<SourceSummary>,
}

impl Validate for ResearcherReply {
    fn validate(&self) -> std::result::Result<(), String> {
        for (i, source) in self.sources.iter().enumerate() {
            let url = source.url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("source {} has invalid url '{}'", i + 1, source.url));
            }
        }
        Ok(())
    }
}

/// Per-researcher entry of `research_summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearcherOutcome {
    pub researcher_id: usize,
    pub angle: String,
    pub query: String,
    pub sources_found: usize,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub topic: String,
    pub num_researchers: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_sources: usize,
    pub researchers: Vec<ResearcherOutcome>,
}

#[derive(Debug, Clone)]
pub struct ResearchOutput {
    pub sources: Vec<SourceSummary>,
    pub summary: ResearchSummary,
}

struct Assignment {
    researcher_id: usize,
    angle: &'static str,
    query: String,
}

fn assignment(topic: &str, index: usize) -> Assignment {
    let (angle, keywords) = ANGLES[index % ANGLES.len()];
    Assignment {
        researcher_id: index + 1,
        angle,
        query: format!("{} {}", topic, keywords),
    }
}

pub async fn run(ctx: &StageContext, topic: &str) -> Result<ResearchOutput> {
    let num_researchers = ctx.config.num_researchers;
    let date_accessed = chrono::Local::now().format("%Y-%m-%d").to_string();

    ctx.session
        .log(&format!("Dispatching {} researchers", num_researchers))
        .await;

    let mut group = TaskGroup::new(STAGE);
    for index in 0..num_researchers {
        let ctx = ctx.clone();
        let topic = topic.to_string();
        let date_accessed = date_accessed.clone();
        group.spawn(async move { run_researcher(&ctx, &topic, index, &date_accessed).await });
    }

    let outcome = group
        .join(JoinPolicy::AllowPartial { min_successes: 1 })
        .await?;

    let mut researchers = Vec::with_capacity(num_researchers);
    let mut sources = Vec::new();

    for (_, (entry, found)) in outcome.successes {
        researchers.push(entry);
        sources.extend(found);
    }

    for (index, error) in &outcome.failures {
        let a = assignment(topic, *index);
        tracing::warn!(researcher = a.researcher_id, "Researcher failed: {}", error);
        ctx.session
            .log(&format!("Researcher {} failed: {}", a.researcher_id, error))
            .await;
        ctx.emit(
            PipelineEventKind::ResearcherFailed,
            STAGE,
            json!({"researcher_id": a.researcher_id, "error": error.to_string()}),
        )
        .await;
        researchers.push(ResearcherOutcome {
            researcher_id: a.researcher_id,
            angle: a.angle.to_string(),
            query: a.query,
            sources_found: 0,
            file: None,
            error: Some(error.to_string()),
        });
    }
    researchers.sort_by_key(|r| r.researcher_id);

    let successful = researchers.iter().filter(|r| r.error.is_none()).count();
    let summary = ResearchSummary {
        topic: topic.to_string(),
        num_researchers,
        successful,
        failed: num_researchers - successful,
        total_sources: sources.len(),
        researchers,
    };
    ctx.session
        .write_json(STAGE, "research_summary.json", &summary)
        .await?;

    ctx.session
        .log(&format!(
            "Research complete: {}/{} researchers succeeded, {} sources",
            successful,
            num_researchers,
            sources.len()
        ))
        .await;

    if sources.is_empty() {
        return Err(GhostwriterError::StageFailed {
            stage: STAGE,
            reason: "no researcher found any sources".to_string(),
        });
    }

    tracing::info!(
        successful,
        sources = sources.len(),
        "Research stage complete"
    );
    Ok(ResearchOutput { sources, summary })
}

async fn run_researcher(
    ctx: &StageContext,
    topic: &str,
    index: usize,
    date_accessed: &str,
) -> Result<(ResearcherOutcome, Vec<SourceSummary>)> {
    let a = assignment(topic, index);
    let hits = ctx
        .search
        .search(&a.query, ctx.config.results_per_search)
        .await?;

    let mut sources = if hits.is_empty() {
        Vec::new()
    } else {
        let researcher_id = a.researcher_id.to_string();
        let search_results = format_results_markdown(&a.query, &hits);
        let prompt = prompts::render(
            "researcher",
            prompts::RESEARCHER,
            &[
                ("researcher_id", researcher_id.as_str()),
                ("angle", a.angle),
                ("topic", topic),
                ("search_results", search_results.as_str()),
                ("date_accessed", date_accessed),
            ],
        )?;

        let reply = ctx
            .complete(ctx.request_with_search(STAGE, prompt, 4096))
            .await?;
        parse_structured::<ResearcherReply>(STAGE, &reply)?.sources
    };

    sources.truncate(MAX_SOURCES_PER_RESEARCHER);
    for source in &mut sources {
        source.date_accessed = date_accessed.to_string();
    }

    let file = if sources.is_empty() {
        None
    } else {
        let name = format!("source_{:02}.md", a.researcher_id);
        ctx.session
            .write_text(STAGE, &name, &format_sources(&sources))
            .await?;
        Some(name)
    };

    ctx.emit(
        PipelineEventKind::ResearcherCompleted,
        STAGE,
        json!({"researcher_id": a.researcher_id, "sources": sources.len()}),
    )
    .await;

    Ok((
        ResearcherOutcome {
            researcher_id: a.researcher_id,
            angle: a.angle.to_string(),
            query: a.query,
            sources_found: sources.len(),
            file,
            error: None,
        },
        sources,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, ScriptedModel, StaticSearch};
    use std::sync::Arc;

    fn reply(n: usize) -> String {
        let sources: Vec<_> = (0..n)
            .map(|i| {
                json!({
                    "url": format!("https://source{}.org", i),
                    "title": format!("Source {}", i),
                    "date_published": "2025-01-01",
                    "source_type": "news",
                    "excerpts": "- \"quote\"",
                    "summary": "summary"
                })
            })
            .collect();
        format!("```json\n{}\n```", json!({ "sources": sources }))
    }

    #[tokio::test]
    async fn test_each_researcher_writes_one_file() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|_| Ok(reply(3)));
        let ctx = context(tmp.path(), 3, Arc::new(llm), StaticSearch::with_hits(4)).await;

        let output = run(&ctx, "Stellar DeFi").await.unwrap();
        assert_eq!(output.sources.len(), 9);
        assert_eq!(output.summary.successful, 3);

        let files = crate::session::io::list_files(ctx.session.stage_path(STAGE))
            .await
            .unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["research_summary.json", "source_01.md", "source_02.md", "source_03.md"]
        );
    }

    #[tokio::test]
    async fn test_researcher_without_sources_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|request| {
            if request.prompt.contains("researcher #2") {
                Ok(r#"{"sources": []}"#.to_string())
            } else {
                Ok(reply(2))
            }
        });
        let ctx = context(tmp.path(), 3, Arc::new(llm), StaticSearch::with_hits(2)).await;

        let output = run(&ctx, "Stellar").await.unwrap();
        assert_eq!(output.summary.researchers[1].sources_found, 0);
        assert!(!ctx.session.has_artifact(STAGE, "source_02.md").await);
        assert!(ctx.session.has_artifact(STAGE, "source_03.md").await);
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|request| {
            if request.prompt.contains("researcher #1") {
                Ok("not json at all".to_string())
            } else {
                Ok(reply(3))
            }
        });
        let ctx = context(tmp.path(), 2, Arc::new(llm), StaticSearch::with_hits(2)).await;

        let output = run(&ctx, "Stellar").await.unwrap();
        assert_eq!(output.summary.failed, 1);
        assert!(output.summary.researchers[0].error.is_some());
        assert_eq!(output.sources.len(), 3);
    }

    #[tokio::test]
    async fn test_no_sources_fails_stage() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|_| Ok(reply(3)));
        let ctx = context(tmp.path(), 2, Arc::new(llm), StaticSearch::with_hits(0)).await;

        let err = run(&ctx, "Stellar").await.unwrap_err();
        assert!(matches!(err, GhostwriterError::StageFailed { stage: StageId::Research, .. }));
        assert!(ctx.session.has_artifact(STAGE, "research_summary.json").await);
    }

    #[test]
    fn test_angles_cycle() {
        assert_eq!(assignment("t", 0).angle, assignment("t", 6).angle);
        assert_eq!(assignment("t", 7).researcher_id, 8);
    }
}
