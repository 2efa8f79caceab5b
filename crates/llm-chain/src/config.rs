use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::Backoff;
use crate::chain::{ChainSettings, FallbackChain};
use crate::error::ChainError;
use crate::http::{ApiStyle, HttpProvider, ProviderEndpoint};
use crate::provider::ProviderRegistry;
use crate::types::ProviderCandidate;

/// The `llm:` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<ProviderCandidate>,
    #[serde(default = "default_max_retries_per_model")]
    pub max_retries_per_model: u32,
    #[serde(default)]
    pub backoff: Backoff,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderEndpoint>,
}

fn default_candidates() -> Vec<ProviderCandidate> {
    vec![
        ProviderCandidate::new("openrouter", "meta-llama/llama-4-maverick:free", 0),
        ProviderCandidate::new("anthropic", "claude-sonnet-4-20250514", 1),
    ]
}

fn default_max_retries_per_model() -> u32 {
    2
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_providers() -> BTreeMap<String, ProviderEndpoint> {
    let mut m = BTreeMap::new();
    m.insert(
        "openrouter".to_string(),
        ProviderEndpoint {
            api: ApiStyle::OpenAi,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
        },
    );
    m.insert(
        "openai".to_string(),
        ProviderEndpoint {
            api: ApiStyle::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        },
    );
    m.insert(
        "anthropic".to_string(),
        ProviderEndpoint {
            api: ApiStyle::Anthropic,
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
        },
    );
    m
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            max_retries_per_model: default_max_retries_per_model(),
            backoff: Backoff::default(),
            call_timeout_secs: default_call_timeout_secs(),
            providers: default_providers(),
        }
    }
}

impl ChainConfig {
    pub fn settings(&self) -> ChainSettings {
        ChainSettings {
            max_retries_per_model: self.max_retries_per_model,
            backoff: self.backoff.clone(),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }

    /// Registry of HTTP clients, one per configured endpoint.
    pub fn registry(&self) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for (name, endpoint) in &self.providers {
            registry.register(Arc::new(HttpProvider::from_endpoint(name.clone(), endpoint)));
        }
        registry
    }

    pub fn build(&self) -> Result<FallbackChain, ChainError> {
        if self.call_timeout_secs == 0 {
            return Err(ChainError::Configuration(
                "call_timeout_secs must be at least 1".into(),
            ));
        }
        FallbackChain::new(self.candidates.clone(), self.registry(), self.settings())
    }

    /// Problems `build` would reject, as messages.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.candidates.is_empty() {
            out.push("llm.candidates is empty".to_string());
        }
        if self.max_retries_per_model == 0 {
            out.push("llm.max_retries_per_model must be at least 1".to_string());
        }
        if self.call_timeout_secs == 0 {
            out.push("llm.call_timeout_secs must be at least 1".to_string());
        }
        for c in &self.candidates {
            if !self.providers.contains_key(&c.provider) {
                out.push(format!(
                    "llm candidate '{}' names unknown provider '{}'",
                    c.model, c.provider
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let cfg = ChainConfig::default();
        assert!(cfg.problems().is_empty());
        let chain = cfg.build().unwrap();
        assert_eq!(chain.candidates()[0].provider, "openrouter");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let cfg: ChainConfig = serde_yaml::from_str(
            "candidates:\n  - provider: anthropic\n    model: claude-haiku\nmax_retries_per_model: 3\n",
        )
        .unwrap();
        assert_eq!(cfg.candidates.len(), 1);
        assert_eq!(cfg.candidates[0].priority, 0);
        assert_eq!(cfg.max_retries_per_model, 3);
        assert!(cfg.providers.contains_key("anthropic"));
        assert_eq!(cfg.call_timeout_secs, 30);
    }

    #[test]
    fn unknown_provider_is_reported_and_rejected() {
        let cfg = ChainConfig {
            candidates: vec![ProviderCandidate::new("mystery", "m", 0)],
            ..ChainConfig::default()
        };
        assert_eq!(cfg.problems().len(), 1);
        assert!(matches!(cfg.build(), Err(ChainError::Configuration(_))));
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = ChainConfig {
            call_timeout_secs: 0,
            ..ChainConfig::default()
        };
        assert!(matches!(cfg.build(), Err(ChainError::Configuration(_))));
    }
}
