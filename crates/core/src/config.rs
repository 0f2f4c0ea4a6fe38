//! # Configuration
//!
//! Run settings and credential discovery. Credentials are read through a
//! lookup closure so callers (and tests) decide where values come from.

use crate::claims::Verdict;
use crate::error::{GhostwriterError, Result};
use crate::llm::bedrock::BedrockAuth;
use crate::llm::sigv4::AwsCredentials;
use crate::models::{LlmProvider, ModelRouting};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Verdict assigned when a cited URL is unreachable or yields no content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachablePolicy {
    #[default]
    Unsupported,
    Inconclusive,
}

impl UnreachablePolicy {
    pub fn verdict(self) -> Verdict {
        match self {
            UnreachablePolicy::Unsupported => Verdict::Unsupported,
            UnreachablePolicy::Inconclusive => Verdict::Inconclusive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostwriterConfig {
    /// Directory holding one subdirectory per session
    pub workspace_root: PathBuf,
    pub num_researchers: usize,
    /// Upper bound on revise/re-verify passes (at least 1)
    pub max_revision_iterations: u32,
    /// Pass rate that ends the revision loop early
    pub verification_threshold: f64,
    pub unreachable_policy: UnreachablePolicy,
    /// Still GET a URL whose HEAD probe failed (for servers that reject HEAD)
    pub fetch_when_head_fails: bool,
    /// Claims verified at the same time
    pub max_concurrent_checks: usize,
    pub results_per_search: u32,
    pub models: ModelRouting,
    /// Directory of `<name>.md` style guides overriding the built-ins
    pub style_guide_dir: Option<PathBuf>,
    /// External search program invoked as `<cmd> search <query> --json`
    pub search_command: Option<String>,
}

impl Default for GhostwriterConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./ghostwriter_sessions"),
            num_researchers: 5,
            max_revision_iterations: 3,
            verification_threshold: 0.90,
            unreachable_policy: UnreachablePolicy::default(),
            fetch_when_head_fails: false,
            max_concurrent_checks: 8,
            results_per_search: 5,
            models: ModelRouting::default(),
            style_guide_dir: None,
            search_command: None,
        }
    }
}

impl GhostwriterConfig {
    /// Defaults plus overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `GHOSTWRITER_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = get("GHOSTWRITER_WORKSPACE") {
            self.workspace_root = PathBuf::from(root);
        }
        if let Some(provider) = get("GHOSTWRITER_PROVIDER") {
            self.models.provider = provider.parse().map_err(GhostwriterError::Config)?;
        }
        if let Some(dir) = get("GHOSTWRITER_STYLE_GUIDES") {
            self.style_guide_dir = Some(PathBuf::from(dir));
        }
        if let Some(command) = get("GHOSTWRITER_SEARCH_COMMAND") {
            self.search_command = Some(command);
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_researchers == 0 {
            return Err(GhostwriterError::config("num_researchers must be at least 1"));
        }
        if self.max_revision_iterations == 0 {
            return Err(GhostwriterError::config(
                "max_revision_iterations must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.verification_threshold) {
            return Err(GhostwriterError::config(format!(
                "verification_threshold {} outside [0, 1]",
                self.verification_threshold
            )));
        }
        if self.max_concurrent_checks == 0 {
            return Err(GhostwriterError::config(
                "max_concurrent_checks must be at least 1",
            ));
        }
        if self.results_per_search == 0 {
            return Err(GhostwriterError::config("results_per_search must be at least 1"));
        }
        Ok(())
    }
}

/// Secrets needed to reach the model and search services
#[derive(Clone, Default)]
pub struct Credentials {
    pub region: String,
    bearer_token: Option<String>,
    aws: Option<AwsCredentials>,
    tavily_api_key: Option<String>,
    provider_keys: HashMap<LlmProvider, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("bearer_token", &self.bearer_token.is_some())
            .field("aws", &self.aws.is_some())
            .field("tavily_api_key", &self.tavily_api_key.is_some())
            .field("provider_keys", &self.provider_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let aws = match (get("AWS_ACCESS_KEY_ID"), get("AWS_SECRET_ACCESS_KEY")) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AwsCredentials {
                access_key_id,
                secret_access_key,
                session_token: get("AWS_SESSION_TOKEN"),
            }),
            _ => None,
        };

        let provider_keys = LlmProvider::all()
            .into_iter()
            .filter_map(|p| {
                let key = get(p.api_key_env()?)?;
                Some((p, key))
            })
            .collect();

        Self {
            region: get("AWS_REGION")
                .or_else(|| get("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            bearer_token: get("AWS_BEARER_TOKEN_BEDROCK"),
            aws,
            tavily_api_key: get("TAVILY_API_KEY").map(|k| strip_quotes(&k).to_string()),
            provider_keys,
        }
    }

    /// Bearer token wins over access keys
    pub fn bedrock_auth(&self) -> Result<BedrockAuth> {
        if let Some(token) = &self.bearer_token {
            return Ok(BedrockAuth::BearerToken(token.clone()));
        }
        if let Some(aws) = &self.aws {
            return Ok(BedrockAuth::SigV4(aws.clone()));
        }
        Err(GhostwriterError::config(
            "no Bedrock credentials: set AWS_BEARER_TOKEN_BEDROCK or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
        ))
    }

    pub fn tavily_api_key(&self) -> Result<&str> {
        self.tavily_api_key
            .as_deref()
            .ok_or_else(|| GhostwriterError::config("TAVILY_API_KEY is not set"))
    }

    pub fn require_provider_key(&self, provider: LlmProvider) -> Result<()> {
        match provider.api_key_env() {
            None => self.bedrock_auth().map(|_| ()),
            Some(_) if self.provider_keys.contains_key(&provider) => Ok(()),
            Some(var) => Err(GhostwriterError::config(format!(
                "{} is not set for provider {}",
                var,
                provider.display_name()
            ))),
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GhostwriterConfig::default();
        assert_eq!(config.num_researchers, 5);
        assert_eq!(config.max_revision_iterations, 3);
        assert!((config.verification_threshold - 0.90).abs() < f64::EPSILON);
        assert_eq!(config.unreachable_policy, UnreachablePolicy::Unsupported);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = GhostwriterConfig {
            num_researchers: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_config());

        let config = GhostwriterConfig {
            max_revision_iterations: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = GhostwriterConfig {
            verification_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = GhostwriterConfig::default()
            .with_env_overrides(lookup(&[
                ("GHOSTWRITER_WORKSPACE", "/tmp/gw"),
                ("GHOSTWRITER_PROVIDER", "anthropic"),
            ]))
            .unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/tmp/gw"));
        assert_eq!(config.models.provider, LlmProvider::Anthropic);

        let err = GhostwriterConfig::default()
            .with_env_overrides(lookup(&[("GHOSTWRITER_PROVIDER", "llama")]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_bearer_token_preferred() {
        let creds = Credentials::from_lookup(lookup(&[
            ("AWS_BEARER_TOKEN_BEDROCK", "abc"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]));
        assert!(matches!(
            creds.bedrock_auth().unwrap(),
            BedrockAuth::BearerToken(t) if t == "abc"
        ));
        assert_eq!(creds.region, DEFAULT_REGION);
    }

    #[test]
    fn test_access_keys_and_region() {
        let creds = Credentials::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", "session"),
            ("AWS_DEFAULT_REGION", "us-west-2"),
        ]));
        match creds.bedrock_auth().unwrap() {
            BedrockAuth::SigV4(aws) => {
                assert_eq!(aws.access_key_id, "AKID");
                assert_eq!(aws.session_token.as_deref(), Some("session"));
            }
            other => panic!("unexpected auth {:?}", other),
        }
        assert_eq!(creds.region, "us-west-2");
    }

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let creds = Credentials::from_lookup(lookup(&[("AWS_ACCESS_KEY_ID", "only-half")]));
        assert!(creds.bedrock_auth().unwrap_err().is_config());
        assert!(creds.tavily_api_key().unwrap_err().is_config());
        assert!(creds
            .require_provider_key(LlmProvider::OpenAI)
            .unwrap_err()
            .is_config());
    }

    #[test]
    fn test_tavily_key_quotes_stripped() {
        let creds = Credentials::from_lookup(lookup(&[
            ("TAVILY_API_KEY", "\"tvly-123\""),
            ("OPENAI_API_KEY", "sk-1"),
        ]));
        assert_eq!(creds.tavily_api_key().unwrap(), "tvly-123");
        assert!(creds.require_provider_key(LlmProvider::OpenAI).is_ok());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::from_lookup(lookup(&[("TAVILY_API_KEY", "tvly-secret")]));
        assert!(!format!("{:?}", creds).contains("tvly-secret"));
    }
}
