use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay between consecutive attempts on the same candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        delay_ms: u64,
    },
    Exponential {
        base_ms: u64,
        max_ms: u64,
        #[serde(default = "default_factor")]
        factor: f64,
    },
}

fn default_factor() -> f64 {
    2.0
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            base_ms: 500,
            max_ms: 8_000,
            factor: default_factor(),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0 = the first retry).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential {
                base_ms,
                max_ms,
                factor,
            } => {
                let exp = i32::try_from(retry).unwrap_or(i32::MAX);
                let ms = (base_ms as f64 * factor.max(1.0).powi(exp)).min(max_ms as f64);
                Duration::from_millis(ms as u64)
            }
        }
    }
}
