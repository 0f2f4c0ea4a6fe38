//! # Ghostwriter Core
//!
//! The "Brain" of Ghostwriter - the research-and-writing pipeline, its
//! stage executors, session storage and model backends.
//!
//! ## Architecture
//!
//! - `pipeline/` - Orchestrator, revision loop, fan-out and progress events
//! - `stages/` - One executor per stage plus the bundled prompt templates
//! - `session/` - Per-run working directories and artifact IO
//! - `llm/` - `LanguageModel` trait with Bedrock and radkit backends
//! - `tools/` - Web search and source fetching
//! - `models/` - Provider and per-stage model routing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ghostwriter_core::{config::GhostwriterConfig, pipeline::Ghostwriter};
//!
//! let ghostwriter = Ghostwriter::from_env(GhostwriterConfig::from_env()?)?;
//! let result = ghostwriter.run("Stellar DeFi lending", "technical").await?;
//! ```

pub mod claims;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod session;
pub mod sources;
pub mod stages;
pub mod style;
pub mod tools;

pub use error::{GhostwriterError, Result};
pub use pipeline::{Ghostwriter, PipelineResult, RunScope};
