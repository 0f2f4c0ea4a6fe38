//! # Web Search
//!
//! Search backends used by the research stage. `TavilySearch` calls the
//! Tavily API directly; `SubprocessSearch` shells out to a program speaking
//! the `search <query> --max-results N --json` protocol (the
//! `ghostwriter search` command is one).

use crate::error::{GhostwriterError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;

const TAVILY_URL: &str = "https://api.tavily.com/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);
const CONTENT_PREVIEW_CHARS: usize = 800;

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// JSON document printed by `ghostwriter search --json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>>;
}

pub struct TavilySearch {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: TAVILY_URL.to_string(),
        })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&TavilyRequest {
                api_key: &self.api_key,
                query,
                max_results,
                search_depth: "advanced",
                include_raw_content: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GhostwriterError::Network(format!(
                "tavily search failed with {}: {}",
                status,
                detail.chars().take(300).collect::<String>()
            )));
        }

        let parsed: TavilyResponse = response.json().await?;
        tracing::info!(query, results = parsed.results.len(), "web search complete");
        Ok(parsed.results)
    }
}

/// Search by running an external program
pub struct SubprocessSearch {
    program: String,
    args: Vec<String>,
}

impl SubprocessSearch {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line like `ghostwriter --quiet` on whitespace
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| GhostwriterError::config("search command is empty"))?;
        Ok(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl WebSearch for SubprocessSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchHit>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("search")
            .arg(query)
            .arg("--max-results")
            .arg(max_results.to_string())
            .arg("--json")
            .output()
            .await
            .map_err(|e| {
                GhostwriterError::Network(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(GhostwriterError::Network(format!(
                "{} search exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let response: SearchResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            GhostwriterError::Network(format!("{} printed invalid JSON: {}", self.program, e))
        })?;
        Ok(response.results)
    }
}

/// Render hits for a human or a model prompt
pub fn format_results_markdown(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for query: {}", query);
    }

    let rule = "=".repeat(60);
    let mut out = vec![
        format!("Search Results for: {}\n", query),
        format!("Found {} authoritative sources:\n", hits.len()),
    ];

    for (idx, hit) in hits.iter().enumerate() {
        out.push(format!("\n{}", rule));
        out.push(format!("Result #{}", idx + 1));
        out.push(rule.clone());
        out.push(format!("Title: {}", or_na(&hit.title)));
        out.push(format!("URL: {}", or_na(&hit.url)));
        out.push(format!("Relevance Score: {:.2}", hit.score));

        if let Some(date) = hit.published_date.as_deref().filter(|d| !d.is_empty()) {
            out.push(format!("Published: {}", date));
        }

        if !hit.content.is_empty() {
            out.push("\nContent Summary:".to_string());
            out.push(hit.content.chars().take(CONTENT_PREVIEW_CHARS).collect());
            if hit.content.chars().count() > CONTENT_PREVIEW_CHARS {
                out.push("... [truncated]".to_string());
            }
        }

        out.push(String::new());
    }

    out.push(format!("\n{}", rule));
    out.push("Search complete. Use these sources for your research.".to_string());
    out.push(format!("{}\n", rule));

    out.join("\n")
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
