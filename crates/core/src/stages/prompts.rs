//! Prompt templates bundled at compile time.
//!
//! Templates use `{{name}}` placeholders. Rendering fails if the template
//! names a placeholder that was not supplied.

use crate::error::{GhostwriterError, Result};
use crate::session::StageId;

/// Researcher - condenses search hits into source summaries
pub const RESEARCHER: &str = include_str!("defaults/researcher.md");

/// Drafter - synthesizes sources into a cited article
pub const DRAFTER: &str = include_str!("defaults/drafter.md");

/// Extractor - splits a draft into atomic claims and citations
pub const EXTRACTOR: &str = include_str!("defaults/extractor.md");

/// Verifier - judges one claim against fetched source text
pub const VERIFIER: &str = include_str!("defaults/verifier.md");

/// Critic - reviews the draft against the verification report
pub const CRITIC: &str = include_str!("defaults/critic.md");

/// Reviser - fixes failed claims following the critique
pub const REVISER: &str = include_str!("defaults/reviser.md");

/// Style applicator - rewrites the article in a style guide's voice
pub const STYLE_APPLICATOR: &str = include_str!("defaults/style_applicator.md");

/// All templates with their names
pub fn all_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        ("researcher", RESEARCHER),
        ("drafter", DRAFTER),
        ("extractor", EXTRACTOR),
        ("verifier", VERIFIER),
        ("critic", CRITIC),
        ("reviser", REVISER),
        ("style_applicator", STYLE_APPLICATOR),
    ]
}

/// Role line sent as the system prompt for each stage
pub fn system_prompt(stage: StageId) -> &'static str {
    match stage {
        StageId::Research => "You are a diligent research assistant. You answer with JSON only.",
        StageId::Draft => "You are an expert research writer who cites every fact.",
        StageId::Extract | StageId::ReVerify => {
            "You extract atomic factual claims from documents. You answer with JSON only."
        }
        StageId::Verify => "You are a strict, impartial fact checker. You answer with JSON only.",
        StageId::Critique => "You are a demanding editor focused on factual accuracy.",
        StageId::Revise => "You are a careful editor who fixes factual problems without inventing facts.",
        StageId::Style => "You are a professional copy editor.",
    }
}

/// Fill `{{name}}` placeholders from `values`
pub fn render(name: &str, template: &str, values: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| GhostwriterError::Template {
            template: name.to_string(),
            placeholder: after.chars().take(20).collect(),
        })?;

        let key = after[..end].trim();
        let value = values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| GhostwriterError::Template {
                template: name.to_string(),
                placeholder: key.to_string(),
            })?;

        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
