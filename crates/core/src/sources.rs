//! # Research Sources
//!
//! A `SourceSummary` is what one researcher learned from one web page.
//! On disk each researcher's findings live in a single markdown file made
//! of one block per source:
//!
//! ```text
//! ---
//! url: https://example.com
//! title: Example
//! date_published: 2025-01-10
//! date_accessed: 2025-02-01
//! source_type: news
//! ---
//!
//! # Key Excerpts
//! ...
//!
//! # Summary
//! ...
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date_published: String,
    #[serde(default)]
    pub date_accessed: String,
    #[serde(default)]
    pub source_type: String,
    #[serde(default)]
    pub excerpts: String,
    #[serde(default)]
    pub summary: String,
}

impl SourceSummary {
    pub fn to_markdown(&self) -> String {
        format!(
            "---\nurl: {}\ntitle: {}\ndate_published: {}\ndate_accessed: {}\nsource_type: {}\n---\n\n# Key Excerpts\n{}\n\n# Summary\n{}\n",
            single_line(&self.url),
            single_line(&self.title),
            single_line(&self.date_published),
            single_line(&self.date_accessed),
            single_line(&self.source_type),
            self.excerpts.trim(),
            self.summary.trim()
        )
    }
}

/// Render several sources as one file
pub fn format_sources(sources: &[SourceSummary]) -> String {
    sources
        .iter()
        .map(SourceSummary::to_markdown)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Excerpts,
    Summary,
}

/// Parse every source block in a research file.
///
/// Blocks without a `url` are dropped.
pub fn parse_sources(content: &str) -> Vec<SourceSummary> {
    let mut sources = Vec::new();
    let mut current: Option<SourceSummary> = None;
    let mut excerpts: Vec<&str> = Vec::new();
    let mut summary: Vec<&str> = Vec::new();
    let mut in_front_matter = false;
    let mut section = Section::None;

    let mut finish = |current: &mut Option<SourceSummary>,
                      excerpts: &mut Vec<&str>,
                      summary: &mut Vec<&str>| {
        if let Some(mut source) = current.take() {
            source.excerpts = excerpts.join("\n").trim().to_string();
            source.summary = summary.join("\n").trim().to_string();
            if !source.url.is_empty() {
                sources.push(source);
            }
        }
        excerpts.clear();
        summary.clear();
    };

    for line in content.lines() {
        if line.trim() == "---" {
            if !in_front_matter {
                finish(&mut current, &mut excerpts, &mut summary);
                current = Some(SourceSummary::default());
                section = Section::None;
            }
            in_front_matter = !in_front_matter;
            continue;
        }

        if in_front_matter {
            if let (Some(source), Some((key, value))) = (current.as_mut(), line.split_once(':')) {
                let value = value.trim().to_string();
                match key.trim() {
                    "url" => source.url = value,
                    "title" => source.title = value,
                    "date_published" => source.date_published = value,
                    "date_accessed" => source.date_accessed = value,
                    "source_type" => source.source_type = value,
                    _ => {}
                }
            }
        } else if line.starts_with("# Key Excerpts") {
            section = Section::Excerpts;
        } else if line.starts_with("# Summary") {
            section = Section::Summary;
        } else {
            match section {
                Section::Excerpts => excerpts.push(line),
                Section::Summary => summary.push(line),
                Section::None => {}
            }
        }
    }
    finish(&mut current, &mut excerpts, &mut summary);

    sources
}

fn single_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, title: &str) -> SourceSummary {
        SourceSummary {
            url: url.into(),
            title: title.into(),
            date_published: "2025-01-15".into(),
            date_accessed: "2025-02-01".into(),
            source_type: "official".into(),
            excerpts: "- \"Soroban launched on mainnet\"\n- \"TVL grew 40%\"".into(),
            summary: "Stellar smart contracts are live.".into(),
        }
    }

    #[test]
    fn test_markdown_layout() {
        let md = source("https://stellar.org/blog", "Soroban").to_markdown();
        assert!(md.starts_with("---\nurl: https://stellar.org/blog\n"));
        assert!(md.contains("\n# Key Excerpts\n"));
        assert!(md.contains("\n# Summary\nStellar smart contracts are live.\n"));
    }

    #[test]
    fn test_multiple_blocks_parse_back() {
        let file = format_sources(&[
            source("https://a.org", "A"),
            source("https://b.org", "B: the sequel"),
        ]);
        let parsed = parse_sources(&file);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], source("https://a.org", "A"));
        assert_eq!(parsed[1].title, "B: the sequel");
        assert_eq!(parsed[1].summary, "Stellar smart contracts are live.");
    }

    #[test]
    fn test_blocks_without_url_are_dropped() {
        let parsed = parse_sources("---\ntitle: orphan\n---\n\n# Summary\nnothing\n");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_front_matter_values_stay_on_one_line() {
        let mut s = source("https://a.org", "Multi\nline title");
        s.source_type = "blog".into();
        let parsed = parse_sources(&s.to_markdown());
        assert_eq!(parsed[0].title, "Multi line title");
    }
}
