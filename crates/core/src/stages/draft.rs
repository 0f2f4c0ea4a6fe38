//! # Stage 2: Draft
//!
//! Synthesizes every research file into one cited markdown article.

use super::context::StageContext;
use super::prompts;
use crate::error::{GhostwriterError, Result};
use crate::llm::strip_code_fence;
use crate::session::{io, StageId};
use crate::sources::{format_sources, parse_sources, SourceSummary};

const STAGE: StageId = StageId::Draft;
pub const DRAFT_FILE: &str = "initial_draft.md";

/// Sources from every research file (`source_*.md`), in file name order
pub async fn load_research_sources(ctx: &StageContext) -> Result<Vec<SourceSummary>> {
    let mut sources = Vec::new();
    for path in io::list_files(ctx.session.stage_path(StageId::Research)).await? {
        let is_source = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("source_") && n.ends_with(".md"))
            .unwrap_or(false);
        if is_source {
            sources.extend(parse_sources(&io::read_text(&path).await?));
        }
    }
    Ok(sources)
}

pub async fn run(ctx: &StageContext, topic: &str) -> Result<String> {
    let research = load_research_sources(ctx).await?;
    if research.is_empty() {
        return Err(GhostwriterError::StageFailed {
            stage: STAGE,
            reason: "no research sources to draft from".to_string(),
        });
    }

    let research_sources = format_sources(&research);
    let prompt = prompts::render(
        "drafter",
        prompts::DRAFTER,
        &[("topic", topic), ("research_sources", research_sources.as_str())],
    )?;

    let reply = ctx.complete(ctx.request(STAGE, prompt, 8192)).await?;
    let draft = strip_code_fence(&reply);
    if draft.is_empty() {
        return Err(GhostwriterError::parse(STAGE, "model returned an empty draft"));
    }

    ctx.session.write_text(STAGE, DRAFT_FILE, &draft).await?;
    ctx.session
        .log(&format!(
            "Draft created from {} research sources ({} chars)",
            research.len(),
            draft.len()
        ))
        .await;
    tracing::info!(sources = research.len(), "Draft stage complete");

    Ok(draft)
}
