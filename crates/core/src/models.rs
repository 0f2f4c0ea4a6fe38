//! # Ghostwriter Models
//!
//! Centralized LLM provider and model selection. Each stage runs on either
//! the fast tier (research, extraction, verification) or the strong tier
//! (drafting, critique, revision, styling), with per-stage overrides.
//!
//! Bedrock is reached directly over HTTPS; the other providers go through
//! radkit, which loads API keys from the environment via `from_env()`.

use crate::session::StageId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Supported LLM providers
///
/// - Bedrock (AWS) - `AWS_BEARER_TOKEN_BEDROCK` or access keys + region
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Bedrock,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Get all available providers
    pub fn all() -> Vec<LlmProvider> {
        vec![
            LlmProvider::Bedrock,
            LlmProvider::Anthropic,
            LlmProvider::OpenAI,
            LlmProvider::Gemini,
            LlmProvider::OpenRouter,
            LlmProvider::Grok,
            LlmProvider::DeepSeek,
        ]
    }

    /// Display name for CLI output
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Bedrock => "AWS Bedrock",
            LlmProvider::Anthropic => "Anthropic",
            LlmProvider::OpenAI => "OpenAI",
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenRouter => "OpenRouter",
            LlmProvider::Grok => "Grok",
            LlmProvider::DeepSeek => "DeepSeek",
        }
    }

    /// Environment variable holding the API key (radkit providers only)
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            LlmProvider::Bedrock => None,
            LlmProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            LlmProvider::OpenAI => Some("OPENAI_API_KEY"),
            LlmProvider::Gemini => Some("GEMINI_API_KEY"),
            LlmProvider::OpenRouter => Some("OPENROUTER_API_KEY"),
            LlmProvider::Grok => Some("XAI_API_KEY"),
            LlmProvider::DeepSeek => Some("DEEPSEEK_API_KEY"),
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Whether requests may hand tools (web search) to the model
    pub fn supports_tools(&self) -> bool {
        !matches!(self, LlmProvider::Bedrock)
    }

    /// Default model for a tier
    pub fn default_model(&self, tier: ModelTier) -> &'static str {
        match (self, tier) {
            (LlmProvider::Bedrock, ModelTier::Fast) => "anthropic.claude-3-5-haiku-20241022-v1:0",
            (LlmProvider::Bedrock, ModelTier::Strong) => {
                "anthropic.claude-3-5-sonnet-20241022-v2:0"
            }
            (LlmProvider::Anthropic, ModelTier::Fast) => "claude-haiku-4-5-20251001",
            (LlmProvider::Anthropic, ModelTier::Strong) => "claude-sonnet-4-5-20250929",
            (LlmProvider::OpenAI, ModelTier::Fast) => "gpt-4o-mini",
            (LlmProvider::OpenAI, ModelTier::Strong) => "gpt-4o",
            (LlmProvider::Gemini, _) => "gemini-2.0-flash-exp",
            (LlmProvider::OpenRouter, ModelTier::Fast) => "anthropic/claude-3.5-haiku",
            (LlmProvider::OpenRouter, ModelTier::Strong) => "anthropic/claude-3.5-sonnet",
            (LlmProvider::Grok, _) => "grok-2",
            (LlmProvider::DeepSeek, _) => "deepseek-chat",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bedrock" | "aws" => Ok(LlmProvider::Bedrock),
            "anthropic" | "claude" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" => Ok(LlmProvider::Gemini),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "grok" | "xai" => Ok(LlmProvider::Grok),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

/// Cost/capability tier a stage runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Strong,
}

impl ModelTier {
    pub fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Research | StageId::Extract | StageId::Verify | StageId::ReVerify => {
                ModelTier::Fast
            }
            StageId::Draft | StageId::Critique | StageId::Revise | StageId::Style => {
                ModelTier::Strong
            }
        }
    }
}

/// Resolved model for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    /// Model name or Bedrock model id
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl ModelConfig {
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Provider plus model choices for every stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelRouting {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Override for the fast tier
    #[serde(default)]
    pub fast_model: Option<String>,
    /// Override for the strong tier
    #[serde(default)]
    pub strong_model: Option<String>,
    /// Per-stage overrides (stage name -> model)
    #[serde(default)]
    pub per_stage_models: HashMap<String, String>,
    /// Base URL override, honored only by providers that support it
    #[serde(default)]
    pub base_url: Option<String>,
}

impl ModelRouting {
    /// Model config for a stage: per-stage override -> tier override -> provider default
    pub fn model_for(&self, stage: StageId) -> ModelConfig {
        let tier = ModelTier::for_stage(stage);
        let tier_override = match tier {
            ModelTier::Fast => self.fast_model.as_ref(),
            ModelTier::Strong => self.strong_model.as_ref(),
        };

        let model = self
            .per_stage_models
            .get(stage.name())
            .or(tier_override)
            .cloned()
            .unwrap_or_else(|| self.provider.default_model(tier).to_string());

        let base_url = if self.provider.supports_base_url() {
            self.base_url.clone()
        } else {
            None
        };

        ModelConfig {
            provider: self.provider,
            model,
            base_url,
        }
    }
}
