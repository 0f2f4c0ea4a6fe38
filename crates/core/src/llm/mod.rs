//! # Language Model Access
//!
//! Every stage talks to a hosted model through the [`LanguageModel`] trait.
//! Production backends are [`BedrockClient`] (direct HTTPS to AWS Bedrock)
//! and [`RadkitModel`] (the radkit providers). Tests substitute a scripted
//! model.

pub mod bedrock;
pub mod radkit;
pub mod sigv4;
pub mod structured;

pub use bedrock::BedrockClient;
pub use self::radkit::RadkitModel;
pub use structured::{extract_json, parse_structured, strip_code_fence, Validate};

use crate::config::{Credentials, GhostwriterConfig};
use crate::error::Result;
use crate::models::LlmProvider;
use crate::session::StageId;
use async_trait::async_trait;
use std::sync::Arc;

/// Whether the model may call tools while answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolAccess {
    #[default]
    None,
    /// Web search through the configured search backend
    WebSearch,
}

/// One prompt/response exchange
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Stage issuing the call, used for logging and scripted test replies
    pub stage: StageId,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub tools: ToolAccess,
}

impl CompletionRequest {
    pub fn new(stage: StageId, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            model: model.into(),
            system: String::new(),
            prompt: prompt.into(),
            max_tokens: 4096,
            tools: ToolAccess::None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_tools(mut self, tools: ToolAccess) -> Self {
        self.tools = tools;
        self
    }
}

/// A hosted text model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one request and return the model's text reply
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Build the model backend for the configured provider
pub fn model_from_config(
    config: &GhostwriterConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn LanguageModel>> {
    match config.models.provider {
        LlmProvider::Bedrock => {
            let auth = credentials.bedrock_auth()?;
            Ok(Arc::new(BedrockClient::new(
                credentials.region.clone(),
                auth,
            )?))
        }
        provider => {
            credentials.require_provider_key(provider)?;
            Ok(Arc::new(RadkitModel::new(
                provider,
                config.models.base_url.clone(),
            )))
        }
    }
}
