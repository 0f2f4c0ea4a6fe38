//! # Search Tool
//!
//! `search_web` exposed as a radkit tool so tool-capable models can run
//! extra searches while researching.

use super::search::{format_results_markdown, TavilySearch, WebSearch};
use crate::config::Credentials;
use radkit::macros::tool;
use radkit::tools::ToolResult;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

/// Arguments for web search
#[derive(Deserialize, JsonSchema)]
pub struct SearchWebArgs {
    /// Search query
    pub query: String,
    /// Maximum number of results (default: 5)
    pub max_results: Option<u32>,
}

/// Search the web for information
#[tool(
    description = "Search the web for authoritative sources. Returns titles, URLs, relevance scores and content excerpts."
)]
pub async fn search_web(args: SearchWebArgs) -> ToolResult {
    let max_results = args.max_results.unwrap_or(5).clamp(1, 20);

    let credentials = Credentials::from_env();
    let api_key = match credentials.tavily_api_key() {
        Ok(key) => key.to_string(),
        Err(e) => return ToolResult::error(e.to_string()),
    };

    let search = match TavilySearch::new(api_key) {
        Ok(search) => search,
        Err(e) => return ToolResult::error(format!("Failed to create search client: {}", e)),
    };

    match search.search(&args.query, max_results).await {
        Ok(hits) => ToolResult::success(json!({
            "query": args.query,
            "num_results": hits.len(),
            "formatted": format_results_markdown(&args.query, &hits),
            "results": hits,
        })),
        Err(e) => ToolResult::error(format!("Search failed: {}", e)),
    }
}
