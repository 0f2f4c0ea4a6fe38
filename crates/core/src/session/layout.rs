//! # Session Layout
//!
//! The eight pipeline stages and the numbered directory each one owns
//! inside a session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Parallel researchers gather source summaries
    Research,
    /// Sources are synthesized into a cited draft
    Draft,
    /// Atomic claims and citations are pulled from the draft
    Extract,
    /// Claims are checked against their cited sources
    Verify,
    /// The draft is reviewed against the verification report
    Critique,
    /// Unsupported claims are fixed
    Revise,
    /// Claims of the revised draft are re-extracted and re-checked
    ReVerify,
    /// The style guide is applied to produce the final report
    Style,
}

impl StageId {
    /// All stages in execution order
    pub const ALL: [StageId; 8] = [
        StageId::Research,
        StageId::Draft,
        StageId::Extract,
        StageId::Verify,
        StageId::Critique,
        StageId::Revise,
        StageId::ReVerify,
        StageId::Style,
    ];

    /// Zero-based position in the pipeline
    pub fn index(self) -> usize {
        match self {
            StageId::Research => 0,
            StageId::Draft => 1,
            StageId::Extract => 2,
            StageId::Verify => 3,
            StageId::Critique => 4,
            StageId::Revise => 5,
            StageId::ReVerify => 6,
            StageId::Style => 7,
        }
    }

    /// Directory name inside the session (`00_research`, `01_draft`, ...)
    pub fn dir_name(self) -> &'static str {
        match self {
            StageId::Research => "00_research",
            StageId::Draft => "01_draft",
            StageId::Extract => "02_extraction",
            StageId::Verify => "03_verification",
            StageId::Critique => "04_critique",
            StageId::Revise => "05_revision",
            StageId::ReVerify => "06_re_verification",
            StageId::Style => "07_style",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StageId::Research => "research",
            StageId::Draft => "draft",
            StageId::Extract => "extract",
            StageId::Verify => "verify",
            StageId::Critique => "critique",
            StageId::Revise => "revise",
            StageId::ReVerify => "re_verify",
            StageId::Style => "style",
        }
    }

    /// Label stored as `current_stage` in session metadata
    pub fn status_label(self) -> String {
        format!("stage_{}_{}", self.index() + 1, self.name())
    }

    /// Look a stage up by its directory name
    pub fn from_dir_name(dir: &str) -> Option<StageId> {
        Self::ALL.into_iter().find(|s| s.dir_name() == dir)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
