use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

// ─── Candidates ───────────────────────────────────────────────────────────

/// One `(provider, model)` pair in the fallback order. Lower `priority` is
/// tried first; ties keep their configured order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub priority: i32,
}

impl ProviderCandidate {
    pub fn new(provider: impl Into<String>, model: impl Into<String>, priority: i32) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            priority,
        }
    }
}

// ─── Requests and results ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

fn default_max_tokens() -> u32 {
    256
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// One provider call made while resolving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub provider: String,
    pub model: String,
    /// `None` when the call succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderError>,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    /// Normalized plain text.
    pub text: String,
    pub provider_used: String,
    pub model_used: String,
    pub attempts: Vec<Attempt>,
}
