//! # Errors
//!
//! Error taxonomy for the pipeline. Configuration problems are fatal before
//! any stage runs; network, model and parse failures abort the remaining
//! stages. A missed verification threshold is not an error.

use crate::session::StageId;
use thiserror::Error;

/// Result alias used across the core crate
pub type Result<T, E = GhostwriterError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GhostwriterError {
    /// Missing credentials, invalid settings, unknown style guide
    #[error("configuration error: {0}")]
    Config(String),

    /// Search, fetch or transport failure talking to an external service
    #[error("network error: {0}")]
    Network(String),

    /// The hosted model rejected or failed the request
    #[error("model call failed: {0}")]
    Llm(String),

    /// Model output did not match the expected shape
    #[error("{stage} stage produced unparseable output: {reason}")]
    Parse { stage: StageId, reason: String },

    /// A prompt template placeholder was left unresolved
    #[error("prompt template '{template}' is missing a value for '{placeholder}'")]
    Template {
        template: String,
        placeholder: String,
    },

    /// Session directory missing or malformed
    #[error("session error: {0}")]
    Session(String),

    /// A stage could not produce its output for a reason other than the above
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: StageId, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GhostwriterError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn parse(stage: StageId, reason: impl Into<String>) -> Self {
        Self::Parse {
            stage,
            reason: reason.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Whether this error was raised before any stage could run
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<reqwest::Error> for GhostwriterError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_stage() {
        let err = GhostwriterError::parse(StageId::Extract, "missing field `claims`");
        let message = err.to_string();
        assert!(message.contains("extract"));
        assert!(message.contains("claims"));
    }

    #[test]
    fn test_config_detection() {
        assert!(GhostwriterError::config("TAVILY_API_KEY not set").is_config());
        assert!(!GhostwriterError::Network("timeout".into()).is_config());
    }
}
