//! # Structured Output
//!
//! Strict boundary between free-form model text and typed data. Model
//! replies are located, parsed and validated here; any failure becomes a
//! single `GhostwriterError::Parse` for the stage that asked.

use crate::error::{GhostwriterError, Result};
use crate::session::StageId;
use serde::de::DeserializeOwned;

/// Shape checks that serde alone cannot express
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Locate the JSON document inside a model reply.
///
/// Prefers a fenced ```json block, then falls back to the outermost
/// `{ ... }` span.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse and validate a structured reply
pub fn parse_structured<T>(stage: StageId, text: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let json = extract_json(text)
        .ok_or_else(|| GhostwriterError::parse(stage, "no JSON object found in model output"))?;

    let value: T =
        serde_json::from_str(json).map_err(|e| GhostwriterError::parse(stage, e.to_string()))?;

    value
        .validate()
        .map_err(|reason| GhostwriterError::parse(stage, reason))?;

    Ok(value)
}

/// Strip a wrapping markdown code fence from a prose reply
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let without_open = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return String::new(),
    };
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        count: u32,
    }

    impl Validate for Sample {
        fn validate(&self) -> std::result::Result<(), String> {
            if self.count == 0 {
                return Err("count must be positive".into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_extract_json_from_fence() {
        let text = "Here you go:\n```json\n{\"count\": 2}\n```\nThanks";
        assert_eq!(extract_json(text), Some("{\"count\": 2}"));
    }

    #[test]
    fn test_extract_json_from_prose() {
        let text = "Result: {\"count\": 3} done";
        assert_eq!(extract_json(text), Some("{\"count\": 3}"));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn test_parse_structured_validates() {
        let ok: Sample = parse_structured(StageId::Extract, "{\"count\": 4}").unwrap();
        assert_eq!(ok.count, 4);

        let err = parse_structured::<Sample>(StageId::Extract, "{\"count\": 0}").unwrap_err();
        assert!(matches!(err, GhostwriterError::Parse { stage: StageId::Extract, .. }));

        let err = parse_structured::<Sample>(StageId::Verify, "{\"total\": 1}").unwrap_err();
        assert!(matches!(err, GhostwriterError::Parse { stage: StageId::Verify, .. }));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```markdown\n# Title\nBody\n```"), "# Title\nBody");
        assert_eq!(strip_code_fence("  # Plain\n"), "# Plain");
    }
}
