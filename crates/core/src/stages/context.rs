//! Everything a stage executor needs, bundled for one session.

use super::prompts;
use crate::config::GhostwriterConfig;
use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel, ToolAccess};
use crate::pipeline::events::{EventSink, PipelineEvent, PipelineEventKind};
use crate::session::{Session, StageId};
use crate::tools::{SourceFetcher, WebSearch};
use std::sync::Arc;

/// Shared, cheaply cloneable handles for a running session
#[derive(Clone)]
pub struct StageContext {
    pub session: Session,
    pub config: Arc<GhostwriterConfig>,
    pub llm: Arc<dyn LanguageModel>,
    pub search: Arc<dyn WebSearch>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub events: EventSink,
}

impl StageContext {
    /// Build a request for `stage` with its routed model and system prompt
    pub fn request(&self, stage: StageId, prompt: String, max_tokens: u32) -> CompletionRequest {
        let model = self.config.models.model_for(stage);
        CompletionRequest::new(stage, model.model, prompt)
            .with_system(prompts::system_prompt(stage))
            .with_max_tokens(max_tokens)
    }

    /// Like `request`, but lets tool-capable models call `search_web`
    pub fn request_with_search(
        &self,
        stage: StageId,
        prompt: String,
        max_tokens: u32,
    ) -> CompletionRequest {
        let tools = if self.config.models.provider.supports_tools() {
            ToolAccess::WebSearch
        } else {
            ToolAccess::None
        };
        self.request(stage, prompt, max_tokens).with_tools(tools)
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<String> {
        tracing::debug!(stage = %request.stage, model = %request.model, "calling model");
        self.llm.complete(request).await
    }

    pub async fn emit(&self, kind: PipelineEventKind, stage: StageId, data: serde_json::Value) {
        self.events
            .emit(
                PipelineEvent::new(kind, self.session.id())
                    .with_stage(stage)
                    .with_data(data),
            )
            .await;
    }
}
