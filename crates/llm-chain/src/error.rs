use serde::Serialize;
use thiserror::Error;

use crate::types::Attempt;

/// Outcome of one failed provider call, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Malformed response, auth failure, unknown model. Not worth repeating.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// `Timeout` and `RateLimited` may succeed on the same candidate later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Timeout(_) | ProviderError::RateLimited(_))
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("all providers exhausted after {} attempts", .attempts.len())]
    AllProvidersExhausted { attempts: Vec<Attempt> },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ChainError {
    /// Attempt trail of an exhausted chain; empty for configuration errors.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            ChainError::AllProvidersExhausted { attempts } => attempts,
            ChainError::Configuration(_) => &[],
        }
    }
}
