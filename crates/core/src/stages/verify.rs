//! # Stages 4 and 7: Verify / Re-verify
//!
//! Three layers per claim, in order:
//!
//! 1. URL check - HEAD probe of the cited URL
//! 2. Content fetch - page text, saved under `content_fetched/`
//! 3. LLM judgement - claim vs. fetched text
//!
//! A claim whose URL fails the check, or whose source yields no text, never
//! reaches layer 3; its verdict comes from the configured `UnreachablePolicy`
//! and is never `supported`. `fetch_when_head_fails` lets layer 2 run for
//! URLs whose HEAD probe failed.

use super::context::StageContext;
use super::{extract, iteration_name, prompts};
use crate::claims::{
    CheckLayer, Citation, Claim, ExtractionOutput, Judgement, UrlCheck, VerificationReport,
    VerificationResult,
};
use crate::error::{GhostwriterError, Result};
use crate::llm::parse_structured;
use crate::pipeline::events::PipelineEventKind;
use crate::pipeline::fanout::{JoinPolicy, TaskGroup};
use crate::session::StageId;
use crate::sources::SourceSummary;
use crate::tools::fetch::truncate_chars;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const REPORT_FILE: &str = "verification_report.json";
pub const URL_CHECKS_FILE: &str = "url_checks.json";
const CONTENT_DIR: &str = "content_fetched";

/// Characters of source text handed to the judge
const JUDGE_CONTENT_CHARS: usize = 4_000;

#[derive(Debug, Clone)]
pub struct VerificationOutput {
    pub report: VerificationReport,
    pub url_checks: Vec<UrlCheck>,
}

/// Run all three layers over every claim of `extraction`
pub async fn verify_claims(
    ctx: &StageContext,
    stage: StageId,
    extraction: &ExtractionOutput,
) -> Result<VerificationOutput> {
    let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_checks));
    let mut group = TaskGroup::new(stage);

    for (claim, citation) in extraction.claims_with_citations() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GhostwriterError::StageFailed {
                stage,
                reason: e.to_string(),
            })?;
        let ctx = ctx.clone();
        let claim = claim.clone();
        let citation = citation.clone();

        group.spawn(async move {
            let _permit = permit;
            check_claim(&ctx, stage, &claim, &citation).await
        });
    }

    let outcome = group.join(JoinPolicy::RequireAll).await?;

    let mut results = Vec::with_capacity(outcome.successes.len());
    let mut url_checks = BTreeMap::new();
    for (_, (result, check)) in outcome.successes {
        results.push(result);
        url_checks.entry(check.url.clone()).or_insert(check);
    }

    let report = VerificationReport::from_results(results, ctx.config.verification_threshold);
    tracing::info!(
        %stage,
        total = report.total_claims,
        supported = report.supported_claims,
        rate = report.verification_rate,
        "Verification complete"
    );

    Ok(VerificationOutput {
        report,
        url_checks: url_checks.into_values().collect(),
    })
}

async fn check_claim(
    ctx: &StageContext,
    stage: StageId,
    claim: &Claim,
    citation: &Citation,
) -> Result<(VerificationResult, UrlCheck)> {
    // Layer 1
    let check = ctx.fetcher.check_url(&citation.url).await;

    let mut result = VerificationResult {
        claim_id: claim.id,
        claim: claim.text.clone(),
        citation_id: citation.id,
        url: citation.url.clone(),
        verdict: ctx.config.unreachable_policy.verdict(),
        decided_by: CheckLayer::UrlCheck,
        url_reachable: check.reachable,
        status_code: check.status_code,
        content_length: 0,
        confidence: 0.0,
        reasoning: String::new(),
        quote: None,
    };

    // Layer 2
    let content = if check.reachable || ctx.config.fetch_when_head_fails {
        ctx.fetcher.fetch_content(&citation.url).await
    } else {
        None
    };

    match content {
        None => {
            result.decided_by = if check.reachable {
                CheckLayer::ContentFetch
            } else {
                CheckLayer::UrlCheck
            };
            result.reasoning = match (&check.error, check.reachable) {
                (Some(error), false) => format!("Source is unreachable: {}", error),
                (None, false) => "Source is unreachable".to_string(),
                (_, true) => "Source could not be fetched".to_string(),
            };
        }
        Some(text) => {
            result.content_length = text.chars().count();
            let name = format!("{}/claim_{}.txt", CONTENT_DIR, claim.id);
            ctx.session.write_text(stage, &name, &text).await?;

            // Layer 3
            let judgement = judge(ctx, stage, claim, citation, &text).await?;
            result.verdict = judgement.verdict;
            result.decided_by = CheckLayer::LlmJudgement;
            result.confidence = judgement.confidence;
            result.reasoning = judgement.reasoning;
            result.quote = judgement.quote;
        }
    }

    ctx.emit(
        PipelineEventKind::ClaimVerified,
        stage,
        json!({
            "claim_id": result.claim_id,
            "verdict": result.verdict,
            "decided_by": result.decided_by,
        }),
    )
    .await;

    Ok((result, check))
}

async fn judge(
    ctx: &StageContext,
    stage: StageId,
    claim: &Claim,
    citation: &Citation,
    content: &str,
) -> Result<Judgement> {
    let excerpt = truncate_chars(content, JUDGE_CONTENT_CHARS);
    let prompt = prompts::render(
        "verifier",
        prompts::VERIFIER,
        &[
            ("claim", claim.text.as_str()),
            ("source_url", citation.url.as_str()),
            ("source_content", excerpt.as_str()),
        ],
    )?;

    let reply = ctx.complete(ctx.request(stage, prompt, 1024)).await?;
    parse_structured(stage, &reply)
}

async fn write_outputs(
    ctx: &StageContext,
    stage: StageId,
    output: &VerificationOutput,
    iteration: Option<u32>,
) -> Result<()> {
    let (report_name, checks_name) = match iteration {
        Some(n) => (
            iteration_name("verification_report", "json", n),
            iteration_name("url_checks", "json", n),
        ),
        None => (REPORT_FILE.to_string(), URL_CHECKS_FILE.to_string()),
    };
    ctx.session
        .write_json(stage, &checks_name, &output.url_checks)
        .await?;
    ctx.session
        .write_json(stage, &report_name, &output.report)
        .await?;
    Ok(())
}

/// Stage 4: verify the claims extracted from the initial draft
pub async fn run(ctx: &StageContext, extraction: &ExtractionOutput) -> Result<VerificationReport> {
    let stage = StageId::Verify;

    let output = verify_claims(ctx, stage, extraction).await?;
    write_outputs(ctx, stage, &output, None).await?;

    ctx.session
        .log(&format!(
            "Verification: {}/{} claims supported ({:.1}%)",
            output.report.supported_claims,
            output.report.total_claims,
            output.report.verification_rate * 100.0
        ))
        .await;
    Ok(output.report)
}

/// Stage 7: re-extract claims from a revised draft and verify them
pub async fn re_verify(
    ctx: &StageContext,
    draft: &str,
    sources: &[SourceSummary],
    iteration: u32,
) -> Result<(ExtractionOutput, VerificationReport)> {
    let stage = StageId::ReVerify;

    let extraction = extract::extract_claims(ctx, stage, draft, sources).await?;
    ctx.session
        .write_json(
            stage,
            &iteration_name("atomic_claims", "json", iteration),
            &extraction,
        )
        .await?;
    ctx.session
        .write_json(stage, extract::CLAIMS_FILE, &extraction)
        .await?;

    let output = verify_claims(ctx, stage, &extraction).await?;
    write_outputs(ctx, stage, &output, Some(iteration)).await?;
    write_outputs(ctx, stage, &output, None).await?;

    ctx.session
        .log(&format!(
            "Re-verification (iteration {}): {}/{} claims supported ({:.1}%)",
            iteration,
            output.report.supported_claims,
            output.report.total_claims,
            output.report.verification_rate * 100.0
        ))
        .await;
    Ok((extraction, output.report))
}
