//! # Stage 5: Critique

use super::context::StageContext;
use super::prompts;
use crate::claims::VerificationReport;
use crate::error::{GhostwriterError, Result};
use crate::llm::strip_code_fence;
use crate::session::StageId;

const STAGE: StageId = StageId::Critique;
pub const CRITIQUE_FILE: &str = "critique.md";

/// Markdown list of the claims that did not verify, shared with revision
pub fn format_failing_claims(report: &VerificationReport) -> String {
    let failing = report.failing();
    if failing.is_empty() {
        return "None - every claim was supported.".to_string();
    }

    failing
        .iter()
        .map(|r| {
            let mut line = format!(
                "- Claim {} ({:?}, citation [{}] {}): \"{}\"",
                r.claim_id, r.verdict, r.citation_id, r.url, r.claim
            );
            if !r.reasoning.trim().is_empty() {
                line.push_str(&format!("\n  Reason: {}", r.reasoning.trim()));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn run(ctx: &StageContext, draft: &str, report: &VerificationReport) -> Result<String> {
    let rate = format!(
        "{:.1}% ({}/{} claims supported)",
        report.verification_rate * 100.0,
        report.supported_claims,
        report.total_claims
    );
    let failing_claims = format_failing_claims(report);
    let prompt = prompts::render(
        "critic",
        prompts::CRITIC,
        &[
            ("draft", draft),
            ("verification_rate", rate.as_str()),
            ("failing_claims", failing_claims.as_str()),
        ],
    )?;

    let reply = ctx.complete(ctx.request(STAGE, prompt, 4096)).await?;
    let critique = strip_code_fence(&reply);
    if critique.is_empty() {
        return Err(GhostwriterError::parse(STAGE, "model returned an empty critique"));
    }

    ctx.session.write_text(STAGE, CRITIQUE_FILE, &critique).await?;
    ctx.session
        .log(&format!(
            "Critique written ({} failing claims)",
            report.failing().len()
        ))
        .await;
    Ok(critique)
}
