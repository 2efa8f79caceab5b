use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::error::{ChainError, ProviderError};
use crate::normalize::normalize;
use crate::provider::ProviderRegistry;
use crate::types::{Attempt, GenerationRequest, GenerationResult, ProviderCandidate};

// ─── ChainSettings ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChainSettings {
    /// Total calls allowed per candidate, first try included.
    pub max_retries_per_model: u32,
    pub backoff: Backoff,
    /// Upper bound on a single provider call.
    pub call_timeout: Duration,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            max_retries_per_model: 2,
            backoff: Backoff::default(),
            call_timeout: Duration::from_secs(30),
        }
    }
}

// ─── FallbackChain ────────────────────────────────────────────────────────

/// Ordered `(provider, model)` candidates with per-candidate retry.
///
/// Every [`generate`](FallbackChain::generate) call starts again from the
/// highest-priority candidate. With `N` candidates it makes at most
/// `N * max_retries_per_model` provider calls.
#[derive(Debug)]
pub struct FallbackChain {
    candidates: Vec<ProviderCandidate>,
    registry: ProviderRegistry,
    settings: ChainSettings,
}

impl FallbackChain {
    pub fn new(
        mut candidates: Vec<ProviderCandidate>,
        registry: ProviderRegistry,
        settings: ChainSettings,
    ) -> Result<Self, ChainError> {
        if candidates.is_empty() {
            return Err(ChainError::Configuration(
                "no provider candidates configured".into(),
            ));
        }
        if settings.max_retries_per_model == 0 {
            return Err(ChainError::Configuration(
                "max_retries_per_model must be at least 1".into(),
            ));
        }
        if let Some(c) = candidates.iter().find(|c| !registry.contains(&c.provider)) {
            return Err(ChainError::Configuration(format!(
                "candidate '{}' names unknown provider '{}' (known: {})",
                c.model,
                c.provider,
                registry.names().join(", ")
            )));
        }
        // stable: equal priorities keep configured order
        candidates.sort_by_key(|c| c.priority);
        Ok(Self {
            candidates,
            registry,
            settings,
        })
    }

    pub fn candidates(&self) -> &[ProviderCandidate] {
        &self.candidates
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Resolve `request` against the candidates in order.
    ///
    /// `Timeout` and `RateLimited` are retried on the same candidate after a
    /// backoff; `Provider` errors move straight on to the next candidate.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ChainError> {
        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            let Some(provider) = self.registry.get(&candidate.provider) else {
                // checked in new()
                continue;
            };

            for try_no in 0..self.settings.max_retries_per_model {
                if try_no > 0 {
                    let delay = self.settings.backoff.delay_for(try_no - 1);
                    debug!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        delay_ms = delay.as_millis() as u64,
                        "backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }

                let timeout = self.settings.call_timeout;
                let outcome = match tokio::time::timeout(
                    timeout,
                    provider.call(&candidate.model, request, timeout),
                )
                .await
                {
                    Ok(r) => r,
                    Err(_) => Err(ProviderError::Timeout(format!(
                        "no response within {}s",
                        timeout.as_secs()
                    ))),
                };

                // A reply that is nothing but wrapper text counts as a
                // structural failure of this candidate.
                let outcome = outcome.and_then(|raw| {
                    let text = normalize(&raw);
                    if text.trim().is_empty() {
                        Err(ProviderError::Provider("empty reply after normalization".into()))
                    } else {
                        Ok(text)
                    }
                });

                match outcome {
                    Ok(text) => {
                        attempts.push(Attempt {
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            error: None,
                        });
                        info!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            attempts = attempts.len(),
                            "generation succeeded"
                        );
                        return Ok(GenerationResult {
                            text,
                            provider_used: candidate.provider.clone(),
                            model_used: candidate.model.clone(),
                            attempts,
                        });
                    }
                    Err(err) => {
                        warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            attempt = try_no + 1,
                            of = self.settings.max_retries_per_model,
                            error = %err,
                            "provider call failed"
                        );
                        let retryable = err.is_retryable();
                        attempts.push(Attempt {
                            provider: candidate.provider.clone(),
                            model: candidate.model.clone(),
                            error: Some(err),
                        });
                        if !retryable {
                            break;
                        }
                    }
                }
            }
        }

        warn!(attempts = attempts.len(), "every provider candidate failed");
        Err(ChainError::AllProvidersExhausted { attempts })
    }
}
