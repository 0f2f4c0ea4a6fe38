//! # Radkit Backend
//!
//! Runs prompts through the radkit providers (Anthropic, OpenAI, Gemini,
//! OpenRouter, Grok, DeepSeek). Plain requests run as an `LlmFunction`;
//! requests with web search run as an `LlmWorker` holding `search_web`.

use super::{CompletionRequest, LanguageModel, ToolAccess};
use crate::error::{GhostwriterError, Result};
use crate::models::{LlmProvider, ModelConfig};
use crate::tools::search_tool;
use async_trait::async_trait;
use radkit::agent::{LlmFunction, LlmWorker};
use radkit::macros::LLMOutput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bind `$llm` to the radkit client for `config.provider` and evaluate `$body`.
///
/// Bedrock never reaches this point; it has its own client.
macro_rules! with_provider_llm {
    ($config:expr, $llm:ident => $body:expr) => {{
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };

        let config: &ModelConfig = $config;
        match config.provider {
            LlmProvider::Bedrock => Err(anyhow::anyhow!(
                "bedrock is served by BedrockClient, not radkit"
            )),
            LlmProvider::Anthropic => {
                let $llm = AnthropicLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::OpenAI => {
                let mut $llm = OpenAILlm::from_env(&config.model)?;
                if let Some(base_url) = &config.base_url {
                    $llm = $llm.with_base_url(base_url);
                }
                $body
            }
            LlmProvider::Gemini => {
                let $llm = GeminiLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::OpenRouter => {
                let $llm = OpenRouterLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::Grok => {
                let $llm = GrokLlm::from_env(&config.model)?;
                $body
            }
            LlmProvider::DeepSeek => {
                let $llm = DeepSeekLlm::from_env(&config.model)?;
                $body
            }
        }
    }};
}

const SYSTEM_PROMPT: &str = "You are a careful research writing assistant. \
Follow the task instructions exactly and put your complete answer, including any \
JSON or markdown the task asks for, in the `text` field.";

/// Envelope the radkit structured-output machinery fills in
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, LLMOutput)]
pub struct ModelReply {
    /// The complete answer to the task
    pub text: String,
}

/// `LanguageModel` backed by a radkit provider
pub struct RadkitModel {
    provider: LlmProvider,
    base_url: Option<String>,
}

impl RadkitModel {
    pub fn new(provider: LlmProvider, base_url: Option<String>) -> Self {
        Self { provider, base_url }
    }

    fn model_config(&self, model: &str) -> ModelConfig {
        ModelConfig {
            provider: self.provider,
            model: model.to_string(),
            base_url: self.base_url.clone(),
        }
    }

    async fn run(
        config: &ModelConfig,
        tools: ToolAccess,
        input: String,
    ) -> anyhow::Result<ModelReply> {
        match tools {
            ToolAccess::None => with_provider_llm!(config, llm => {
                LlmFunction::<ModelReply>::new_with_system_instructions(llm, SYSTEM_PROMPT)
                    .run(input)
                    .await
                    .map_err(Into::into)
            }),
            // Tool-calling loop
            ToolAccess::WebSearch => with_provider_llm!(config, llm => {
                LlmWorker::<ModelReply>::builder(llm)
                    .with_system_instructions(SYSTEM_PROMPT)
                    .with_tool(search_tool::search_web)
                    .build()
                    .run(input)
                    .await
                    .map_err(Into::into)
            }),
        }
    }
}

/// Fold the per-stage system prompt into the user input
fn compose_input(request: &CompletionRequest) -> String {
    if request.system.trim().is_empty() {
        request.prompt.clone()
    } else {
        format!(
            "## Instructions\n\n{}\n\n## Task\n\n{}",
            request.system.trim(),
            request.prompt
        )
    }
}

#[async_trait]
impl LanguageModel for RadkitModel {
    #[tracing::instrument(skip(self, request), fields(stage = %request.stage, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let config = self.model_config(&request.model);
        let input = compose_input(&request);

        let reply = Self::run(&config, request.tools, input)
            .await
            .map_err(|e| GhostwriterError::Llm(format!("{}: {}", config.provider.display_name(), e)))?;

        Ok(reply.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StageId;

    #[test]
    fn test_compose_input_folds_system_prompt() {
        let request = CompletionRequest::new(StageId::Critique, "gpt-4o", "Review this draft")
            .with_system("Be strict.");
        let input = compose_input(&request);
        assert!(input.starts_with("## Instructions"));
        assert!(input.contains("Be strict."));
        assert!(input.ends_with("Review this draft"));
    }

    #[test]
    fn test_compose_input_without_system() {
        let request = CompletionRequest::new(StageId::Draft, "gpt-4o", "Write");
        assert_eq!(compose_input(&request), "Write");
    }

    #[tokio::test]
    async fn test_bedrock_is_rejected() {
        let config = ModelConfig::new(LlmProvider::Bedrock, "anthropic.claude");
        let err = RadkitModel::run(&config, ToolAccess::None, "hi".into())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BedrockClient"));
    }
}
