//! # Bedrock Client
//!
//! Calls Anthropic models on AWS Bedrock through the `InvokeModel` REST
//! endpoint. Authenticates with a Bedrock API key (bearer token) or with
//! SigV4-signed access keys.

use super::sigv4::{self, AwsCredentials, SigningRequest};
use super::{CompletionRequest, LanguageModel};
use crate::error::{GhostwriterError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// How requests to Bedrock are authenticated
#[derive(Debug, Clone)]
pub enum BedrockAuth {
    BearerToken(String),
    SigV4(AwsCredentials),
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct BedrockClient {
    http: reqwest::Client,
    region: String,
    auth: BedrockAuth,
}

impl BedrockClient {
    pub fn new(region: impl Into<String>, auth: BedrockAuth) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            region: region.into(),
            auth,
        })
    }

    fn host(&self) -> String {
        format!("bedrock-runtime.{}.amazonaws.com", self.region)
    }

    fn invoke_path(model: &str) -> String {
        format!("/model/{}/invoke", urlencoding::encode(model))
    }
}

#[async_trait]
impl LanguageModel for BedrockClient {
    #[tracing::instrument(skip(self, request), fields(stage = %request.stage, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = serde_json::to_vec(&InvokeBody {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        })?;

        let host = self.host();
        let path = Self::invoke_path(&request.model);
        let url = format!("https://{}{}", host, path);

        let mut builder = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "application/json");

        match &self.auth {
            BedrockAuth::BearerToken(token) => {
                builder = builder.bearer_auth(token);
            }
            BedrockAuth::SigV4(credentials) => {
                let signed = sigv4::sign(
                    &SigningRequest {
                        host: &host,
                        path: &path,
                        region: &self.region,
                        service: "bedrock",
                        content_type: "application/json",
                        body: &body,
                    },
                    credentials,
                    chrono::Utc::now(),
                );
                builder = builder
                    .header("x-amz-date", signed.amz_date)
                    .header("authorization", signed.authorization);
                if let Some(token) = signed.security_token {
                    builder = builder.header("x-amz-security-token", token);
                }
            }
        }

        let response = builder.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GhostwriterError::Llm(format!(
                "bedrock returned {}: {}",
                status,
                detail.chars().take(500).collect::<String>()
            )));
        }

        let parsed: InvokeResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| GhostwriterError::Llm("bedrock response had no text content".into()))?;

        tracing::debug!(chars = text.len(), "bedrock completion received");
        Ok(text)
    }
}
