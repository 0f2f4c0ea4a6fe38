//! # Stage 8: Style

use super::context::StageContext;
use super::prompts;
use crate::error::{GhostwriterError, Result};
use crate::llm::strip_code_fence;
use crate::session::StageId;
use crate::style::StyleGuide;

const STAGE: StageId = StageId::Style;
pub const FINAL_REPORT_FILE: &str = "final_report.md";

pub async fn run(ctx: &StageContext, draft: &str, guide: &StyleGuide) -> Result<String> {
    let prompt = prompts::render(
        "style_applicator",
        prompts::STYLE_APPLICATOR,
        &[("style_guide", guide.content.as_str()), ("draft", draft)],
    )?;

    let reply = ctx.complete(ctx.request(STAGE, prompt, 8192)).await?;
    let report = strip_code_fence(&reply);
    if report.is_empty() {
        return Err(GhostwriterError::parse(STAGE, "model returned an empty report"));
    }

    ctx.session.write_text(STAGE, FINAL_REPORT_FILE, &report).await?;
    ctx.session
        .log(&format!("Applied style guide '{}'", guide.name))
        .await;
    tracing::info!(style = %guide.name, "Style stage complete");
    Ok(report)
}
