//! # Style Guides
//!
//! Read-only writing guides applied by the final stage. Four guides are
//! bundled at compile time; a directory of `<name>.md` files can override
//! them or add new ones.

use crate::error::{GhostwriterError, Result};
use crate::session::io;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const TECHNICAL: &str = include_str!("defaults/technical.md");
pub const CONVERSATIONAL: &str = include_str!("defaults/conversational.md");
pub const ACADEMIC: &str = include_str!("defaults/academic.md");
pub const DEFI_REPORT: &str = include_str!("defaults/defi_report.md");

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleGuide {
    pub name: String,
    pub description: String,
    pub audience: String,
    #[serde(skip_serializing)]
    pub content: String,
}

/// Built-in guides: (name, description, audience, content)
fn builtin_guides() -> [(&'static str, &'static str, &'static str, &'static str); 4] {
    [
        (
            "technical",
            "For engineers and developers. Technical jargon, precise specifications.",
            "Software engineers, blockchain developers",
            TECHNICAL,
        ),
        (
            "conversational",
            "For general audience. Friendly, simple language with analogies.",
            "Crypto enthusiasts, newcomers",
            CONVERSATIONAL,
        ),
        (
            "academic",
            "For research and formal publications. Scholarly rigor, evidence-based.",
            "Researchers, academics, policy makers",
            ACADEMIC,
        ),
        (
            "defi_report",
            "For DeFi investors. Data-driven with APY/TVL metrics and risk assessment.",
            "Yield farmers, crypto analysts",
            DEFI_REPORT,
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct StyleGuideStore {
    guides: BTreeMap<String, StyleGuide>,
}

impl StyleGuideStore {
    pub fn builtin() -> Self {
        let guides = builtin_guides()
            .into_iter()
            .map(|(name, description, audience, content)| {
                (
                    name.to_string(),
                    StyleGuide {
                        name: name.to_string(),
                        description: description.to_string(),
                        audience: audience.to_string(),
                        content: content.to_string(),
                    },
                )
            })
            .collect();
        Self { guides }
    }

    /// Built-ins plus every `<name>.md` in `dir`
    pub async fn load(dir: Option<&Path>) -> Result<Self> {
        let mut store = Self::builtin();
        let Some(dir) = dir else {
            return Ok(store);
        };

        for path in io::list_files(dir).await? {
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let content = io::read_text(&path).await?;
            let guide = match store.guides.get(name) {
                Some(existing) => StyleGuide {
                    content,
                    ..existing.clone()
                },
                None => StyleGuide {
                    name: name.to_string(),
                    description: first_paragraph(&content),
                    audience: String::new(),
                    content,
                },
            };
            tracing::debug!(name, "loaded style guide override");
            store.guides.insert(name.to_string(), guide);
        }

        Ok(store)
    }

    pub fn get(&self, name: &str) -> Result<&StyleGuide> {
        self.guides.get(name).ok_or_else(|| {
            GhostwriterError::config(format!(
                "unknown style guide '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.guides.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> Vec<&StyleGuide> {
        self.guides.values().collect()
    }
}

fn first_paragraph(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_guides() {
        let store = StyleGuideStore::builtin();
        assert_eq!(
            store.names(),
            vec!["academic", "conversational", "defi_report", "technical"]
        );
        let defi = store.get("defi_report").unwrap();
        assert!(defi.content.contains("Risk Assessment"));
        assert_eq!(defi.audience, "Yield farmers, crypto analysts");
    }

    #[test]
    fn test_unknown_guide_is_config_error() {
        let err = StyleGuideStore::builtin().get("pirate").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("defi_report"));
    }

    #[tokio::test]
    async fn test_directory_overrides_and_adds() {
        let tmp = tempfile::tempdir().unwrap();
        io::write_text(tmp.path().join("technical.md"), "# Tech\n\nTerse.")
            .await
            .unwrap();
        io::write_text(tmp.path().join("newsletter.md"), "# Newsletter\n\nWeekly digest tone.")
            .await
            .unwrap();
        io::write_text(tmp.path().join("notes.txt"), "ignored").await.unwrap();

        let store = StyleGuideStore::load(Some(tmp.path())).await.unwrap();
        let tech = store.get("technical").unwrap();
        assert_eq!(tech.content, "# Tech\n\nTerse.");
        assert!(tech.description.starts_with("For engineers"));

        let newsletter = store.get("newsletter").unwrap();
        assert_eq!(newsletter.description, "Weekly digest tone.");
        assert!(store.get("notes").is_err());
    }
}
