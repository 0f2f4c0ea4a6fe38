//! # Tools
//!
//! Network-facing helpers the stages lean on.
//!
//! ## Modules
//!
//! - `search` - Web search backends (Tavily API, subprocess) and result formatting
//! - `fetch` - URL reachability checks and page text extraction
//! - `search_tool` - `search_web` as a radkit tool for tool-calling models

pub mod fetch;
pub mod search;
pub mod search_tool;

pub use fetch::{HttpFetcher, SourceFetcher};
pub use search::{format_results_markdown, SearchHit, SubprocessSearch, TavilySearch, WebSearch};
