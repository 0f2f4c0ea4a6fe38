//! # Claims & Verification Types
//!
//! Claims are atomic factual statements pulled out of a draft. Each one
//! points at exactly one citation by id. Verification produces one
//! `VerificationResult` per claim and a `VerificationReport` with the
//! overall pass rate.

use crate::llm::structured::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

/// A source reference backing one or more claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Number used in the draft as `[id]`
    pub id: u32,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

/// An atomic factual assertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: u32,
    pub text: String,
    /// Id of the citation backing this claim. Accepts `3` or `"[3]"`.
    #[serde(deserialize_with = "deserialize_citation_ref")]
    pub citation: u32,
}

fn deserialize_citation_ref<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid citation reference '{}'", s))),
    }
}

/// Output of the extraction stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub claims: Vec<Claim>,
    pub citations: Vec<Citation>,
}

impl ExtractionOutput {
    pub fn citation(&self, id: u32) -> Option<&Citation> {
        self.citations.iter().find(|c| c.id == id)
    }

    /// Claims paired with the citation they reference
    pub fn claims_with_citations(&self) -> Vec<(&Claim, &Citation)> {
        self.claims
            .iter()
            .filter_map(|claim| self.citation(claim.citation).map(|c| (claim, c)))
            .collect()
    }
}

impl Validate for ExtractionOutput {
    fn validate(&self) -> Result<(), String> {
        let mut citation_ids = HashSet::new();
        for citation in &self.citations {
            if !citation_ids.insert(citation.id) {
                return Err(format!("duplicate citation id {}", citation.id));
            }
            if citation.url.trim().is_empty() {
                return Err(format!("citation {} has no url", citation.id));
            }
        }

        let mut claim_ids = HashSet::new();
        for claim in &self.claims {
            if !claim_ids.insert(claim.id) {
                return Err(format!("duplicate claim id {}", claim.id));
            }
            if claim.text.trim().is_empty() {
                return Err(format!("claim {} has empty text", claim.id));
            }
            if !citation_ids.contains(&claim.citation) {
                return Err(format!(
                    "claim {} references missing citation {}",
                    claim.id, claim.citation
                ));
            }
        }

        Ok(())
    }
}

/// Outcome of checking one claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Unsupported,
    Inconclusive,
}

/// The verification layer that decided a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckLayer {
    UrlCheck,
    ContentFetch,
    LlmJudgement,
}

/// Model answer for a single claim check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgement {
    pub verdict: Verdict,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub quote: Option<String>,
}

impl Validate for Judgement {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

/// Layer 1 outcome for one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlCheck {
    pub url: String,
    pub reachable: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Per-claim verification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub claim_id: u32,
    pub claim: String,
    pub citation_id: u32,
    pub url: String,
    pub verdict: Verdict,
    pub decided_by: CheckLayer,
    pub url_reachable: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Characters of source text fetched (0 when the fetch failed)
    pub content_length: usize,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub quote: Option<String>,
}

impl VerificationResult {
    pub fn is_supported(&self) -> bool {
        self.verdict == Verdict::Supported
    }
}

/// Aggregated verification outcome of a stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub total_claims: usize,
    pub supported_claims: usize,
    pub unsupported_claims: usize,
    pub inconclusive_claims: usize,
    /// supported / total, 0.0 when there are no claims
    pub verification_rate: f64,
    pub threshold: f64,
    pub threshold_met: bool,
    pub results: Vec<VerificationResult>,
}

impl VerificationReport {
    pub fn from_results(mut results: Vec<VerificationResult>, threshold: f64) -> Self {
        results.sort_by_key(|r| r.claim_id);

        let count = |v: Verdict| results.iter().filter(|r| r.verdict == v).count();
        let supported_claims = count(Verdict::Supported);
        let unsupported_claims = count(Verdict::Unsupported);
        let inconclusive_claims = count(Verdict::Inconclusive);
        let verification_rate = pass_rate(&results);

        Self {
            total_claims: results.len(),
            supported_claims,
            unsupported_claims,
            inconclusive_claims,
            verification_rate,
            threshold,
            threshold_met: verification_rate >= threshold,
            results,
        }
    }

    /// Claims that were not judged supported
    pub fn failing(&self) -> Vec<&VerificationResult> {
        self.results.iter().filter(|r| !r.is_supported()).collect()
    }
}

/// Fraction of results with a `Supported` verdict
pub fn pass_rate(results: &[VerificationResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let supported = results.iter().filter(|r| r.is_supported()).count();
    supported as f64 / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u32, verdict: Verdict) -> VerificationResult {
        VerificationResult {
            claim_id: id,
            claim: format!("claim {}", id),
            citation_id: 1,
            url: "https://example.com".into(),
            verdict,
            decided_by: CheckLayer::LlmJudgement,
            url_reachable: true,
            status_code: Some(200),
            content_length: 100,
            confidence: 0.9,
            reasoning: String::new(),
            quote: None,
        }
    }

    fn extraction(json: &str) -> ExtractionOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_citation_reference_accepts_bracketed_text() {
        let out = extraction(
            r#"{"claims":[{"id":1,"text":"Blend offers lending","citation":"[2]"}],
                "citations":[{"id":2,"url":"https://blend.capital"}]}"#,
        );
        assert_eq!(out.claims[0].citation, 2);
        assert!(out.validate().is_ok());
    }

    #[test]
    fn test_dangling_citation_is_rejected() {
        let out = extraction(
            r#"{"claims":[{"id":1,"text":"XLM fees are low","citation":7}],
                "citations":[{"id":1,"url":"https://stellar.org"}]}"#,
        );
        let err = out.validate().unwrap_err();
        assert!(err.contains("missing citation 7"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let out = extraction(
            r#"{"claims":[],
                "citations":[{"id":1,"url":"https://a.org"},{"id":1,"url":"https://b.org"}]}"#,
        );
        assert!(out.validate().is_err());
    }

    #[test]
    fn test_claims_with_citations_resolve() {
        let out = extraction(
            r#"{"claims":[{"id":1,"text":"a","citation":1},{"id":2,"text":"b","citation":1}],
                "citations":[{"id":1,"url":"https://a.org","title":"A"}]}"#,
        );
        let pairs = out.claims_with_citations();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(_, c)| c.title == "A"));
    }

    #[test]
    fn test_pass_rate_formula() {
        let results = vec![
            result(1, Verdict::Supported),
            result(2, Verdict::Unsupported),
            result(3, Verdict::Inconclusive),
            result(4, Verdict::Supported),
        ];
        assert!((pass_rate(&results) - 0.5).abs() < f64::EPSILON);
        assert_eq!(pass_rate(&[]), 0.0);
    }

    #[test]
    fn test_report_counts_and_threshold() {
        let report = VerificationReport::from_results(
            vec![
                result(2, Verdict::Supported),
                result(1, Verdict::Supported),
                result(3, Verdict::Unsupported),
            ],
            0.9,
        );
        assert_eq!(report.total_claims, 3);
        assert_eq!(report.supported_claims, 2);
        assert_eq!(report.unsupported_claims, 1);
        assert!(!report.threshold_met);
        assert!(report.verification_rate >= 0.0 && report.verification_rate <= 1.0);
        assert_eq!(report.results[0].claim_id, 1);
        assert_eq!(report.failing().len(), 1);
    }

    #[test]
    fn test_judgement_confidence_range() {
        let judgement: Judgement =
            serde_json::from_str(r#"{"verdict":"supported","confidence":1.5}"#).unwrap();
        assert!(judgement.validate().is_err());
    }
}
