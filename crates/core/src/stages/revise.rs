//! # Stage 6: Revise

use super::context::StageContext;
use super::critique::format_failing_claims;
use super::{iteration_name, prompts};
use crate::claims::VerificationReport;
use crate::error::{GhostwriterError, Result};
use crate::llm::strip_code_fence;
use crate::session::StageId;

const STAGE: StageId = StageId::Revise;
pub const REVISED_FILE: &str = "revised_draft.md";

/// Revise `draft`, writing the latest copy and an `_iter_<n>` copy
pub async fn run(
    ctx: &StageContext,
    draft: &str,
    critique: &str,
    report: &VerificationReport,
    iteration: u32,
) -> Result<String> {
    let failing_claims = format_failing_claims(report);
    let prompt = prompts::render(
        "reviser",
        prompts::REVISER,
        &[
            ("draft", draft),
            ("critique", critique),
            ("failing_claims", failing_claims.as_str()),
        ],
    )?;

    let reply = ctx.complete(ctx.request(STAGE, prompt, 8192)).await?;
    let revised = strip_code_fence(&reply);
    if revised.is_empty() {
        return Err(GhostwriterError::parse(STAGE, "model returned an empty revision"));
    }

    ctx.session
        .write_text(STAGE, &iteration_name("revised_draft", "md", iteration), &revised)
        .await?;
    ctx.session.write_text(STAGE, REVISED_FILE, &revised).await?;
    ctx.session
        .log(&format!("Revision iteration {} complete", iteration))
        .await;
    Ok(revised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, ScriptedModel, StaticSearch};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_revision_keeps_latest_and_iteration_copies() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|request| {
            assert!(request.prompt.contains("Fix the TVL figure"));
            Ok("# Revised draft".to_string())
        });
        let ctx = context(tmp.path(), 1, Arc::new(llm), StaticSearch::with_hits(1)).await;
        let report = VerificationReport::from_results(Vec::new(), 0.9);

        run(&ctx, "# Draft", "Fix the TVL figure", &report, 1).await.unwrap();
        run(&ctx, "# Draft", "Fix the TVL figure", &report, 2).await.unwrap();

        for name in [REVISED_FILE, "revised_draft_iter_1.md", "revised_draft_iter_2.md"] {
            assert!(ctx.session.has_artifact(STAGE, name).await, "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_empty_revision_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|_| Ok("   ".to_string()));
        let ctx = context(tmp.path(), 1, Arc::new(llm), StaticSearch::with_hits(1)).await;
        let report = VerificationReport::from_results(Vec::new(), 0.9);

        let err = run(&ctx, "# Draft", "c", &report, 1).await.unwrap_err();
        assert!(matches!(err, GhostwriterError::Parse { stage: StageId::Revise, .. }));
    }
}
