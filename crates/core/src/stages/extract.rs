//! # Stage 3: Extract
//!
//! Pulls atomic claims and their citations out of a draft. Re-verification
//! reuses [`extract_claims`] on the revised draft.

use super::context::StageContext;
use super::prompts;
use crate::claims::ExtractionOutput;
use crate::error::Result;
use crate::llm::parse_structured;
use crate::session::StageId;
use crate::sources::SourceSummary;

const STAGE: StageId = StageId::Extract;
pub const CLAIMS_FILE: &str = "atomic_claims.json";
pub const CITATIONS_FILE: &str = "citations.json";

/// Ask the model for claims, validate them, and enrich citations from sources
pub async fn extract_claims(
    ctx: &StageContext,
    stage: StageId,
    draft: &str,
    sources: &[SourceSummary],
) -> Result<ExtractionOutput> {
    let prompt = prompts::render("extractor", prompts::EXTRACTOR, &[("draft", draft)])?;
    let reply = ctx.complete(ctx.request(stage, prompt, 8192)).await?;

    let mut extraction: ExtractionOutput = parse_structured(stage, &reply)?;
    fill_citation_details(&mut extraction, sources);

    tracing::info!(
        %stage,
        claims = extraction.claims.len(),
        citations = extraction.citations.len(),
        "Claims extracted"
    );
    Ok(extraction)
}

/// Fill empty citation titles and snippets from the research source with the same URL
pub fn fill_citation_details(extraction: &mut ExtractionOutput, sources: &[SourceSummary]) {
    for citation in &mut extraction.citations {
        let Some(source) = sources
            .iter()
            .find(|s| same_url(&s.url, &citation.url))
        else {
            continue;
        };
        if citation.title.trim().is_empty() {
            citation.title = source.title.clone();
        }
        if citation.snippet.trim().is_empty() {
            citation.snippet = source.summary.clone();
        }
    }
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}

pub async fn run(
    ctx: &StageContext,
    draft: &str,
    sources: &[SourceSummary],
) -> Result<ExtractionOutput> {
    let extraction = extract_claims(ctx, STAGE, draft, sources).await?;

    ctx.session
        .write_json(STAGE, CLAIMS_FILE, &extraction)
        .await?;
    ctx.session
        .write_json(STAGE, CITATIONS_FILE, &extraction.citations)
        .await?;
    ctx.session
        .log(&format!(
            "Extracted {} atomic claims and {} citations",
            extraction.claims.len(),
            extraction.citations.len()
        ))
        .await;

    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Citation;
    use crate::error::GhostwriterError;
    use crate::testing::{context, ScriptedModel, StaticSearch};
    use std::sync::Arc;

    const REPLY: &str = r#"```json
{"claims":[{"id":1,"text":"Blend TVL is $40M","citation":1},
           {"id":2,"text":"Soroban launched in 2024","citation":"[2]"}],
 "citations":[{"id":1,"url":"https://blend.capital/"},
              {"id":2,"url":"https://stellar.org","title":"Stellar"}]}
```"#;

    fn sources() -> Vec<SourceSummary> {
        vec![SourceSummary {
            url: "https://blend.capital".into(),
            title: "Blend Protocol".into(),
            summary: "Lending on Stellar.".into(),
            ..Default::default()
        }]
    }

    #[tokio::test]
    async fn test_extract_writes_claims_and_citations() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|_| Ok(REPLY.to_string()));
        let ctx = context(tmp.path(), 1, Arc::new(llm), StaticSearch::with_hits(1)).await;

        let extraction = run(&ctx, "# Draft", &sources()).await.unwrap();
        assert_eq!(extraction.claims.len(), 2);
        assert_eq!(extraction.citations[0].title, "Blend Protocol");
        assert_eq!(extraction.citations[0].snippet, "Lending on Stellar.");
        assert_eq!(extraction.citations[1].title, "Stellar");

        let citations: Vec<Citation> = ctx
            .session
            .read_json(STAGE, CITATIONS_FILE)
            .await
            .unwrap();
        assert_eq!(citations.len(), 2);
        assert!(ctx.session.has_artifact(STAGE, CLAIMS_FILE).await);
    }

    #[tokio::test]
    async fn test_dangling_citation_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = ScriptedModel::new(|_| {
            Ok(r#"{"claims":[{"id":1,"text":"x","citation":9}],"citations":[]}"#.to_string())
        });
        let ctx = context(tmp.path(), 1, Arc::new(llm), StaticSearch::with_hits(1)).await;

        let err = run(&ctx, "# Draft", &[]).await.unwrap_err();
        assert!(matches!(err, GhostwriterError::Parse { stage: StageId::Extract, .. }));
        assert!(!ctx.session.has_artifact(STAGE, CLAIMS_FILE).await);
    }
}
