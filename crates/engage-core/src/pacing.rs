//! Randomized spacing between consecutive actions.
//!
//! One [`PacingGovernor`] is shared by every flow of a run. Slot allocation
//! (read last slot, sample delay, sleep, commit new slot) happens under a
//! single async mutex, so no two slots are ever granted closer together than
//! `min_delay`, however many flows are asking.
//!
//! `wait_slot` is cancellation safe: dropping the future while it sleeps
//! releases the lock without committing a slot.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{EngageError, Result};

const RATE_WINDOW: Duration = Duration::from_secs(60);

struct PacingState {
    last_action_at: Option<Instant>,
    /// Granted slots inside the trailing rate window, oldest first.
    recent: VecDeque<Instant>,
    rng: StdRng,
}

pub struct PacingGovernor {
    min_delay: Duration,
    max_delay: Duration,
    max_per_minute: Option<u32>,
    state: Mutex<PacingState>,
}

impl PacingGovernor {
    /// Fails with `Configuration` when `min_delay > max_delay`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Result<Self> {
        if min_delay > max_delay {
            return Err(EngageError::Configuration(format!(
                "pacing min_delay ({:?}) is greater than max_delay ({:?})",
                min_delay, max_delay
            )));
        }
        Ok(Self {
            min_delay,
            max_delay,
            max_per_minute: None,
            state: Mutex::new(PacingState {
                last_action_at: None,
                recent: VecDeque::new(),
                rng: StdRng::from_entropy(),
            }),
        })
    }

    /// Additionally cap the number of slots granted in any 60 second window.
    pub fn with_max_per_minute(mut self, max_per_minute: u32) -> Result<Self> {
        if max_per_minute == 0 {
            return Err(EngageError::Configuration(
                "pacing max_per_minute must be at least 1".into(),
            ));
        }
        self.max_per_minute = Some(max_per_minute);
        Ok(self)
    }

    /// Use a fixed RNG seed so sampled delays are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Suspend until the next action may run and return how long we waited.
    pub async fn wait_slot(&self) -> Duration {
        let started = Instant::now();
        let mut state = self.state.lock().await;

        let delay = if self.min_delay == self.max_delay {
            self.min_delay
        } else {
            state.rng.gen_range(self.min_delay..=self.max_delay)
        };
        let base = state.last_action_at.unwrap_or(started);
        let mut ready_at = base + delay;

        if let Some(cap) = self.max_per_minute {
            let now = Instant::now();
            while state
                .recent
                .front()
                .is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW)
            {
                state.recent.pop_front();
            }
            if state.recent.len() >= cap as usize {
                if let Some(oldest) = state.recent.front() {
                    let cool_down = *oldest + RATE_WINDOW;
                    if cool_down > ready_at {
                        warn!(
                            cap,
                            wait_secs = (cool_down - now).as_secs_f64(),
                            "rate limit reached, cooling down"
                        );
                        ready_at = cool_down;
                    }
                }
            }
        }

        debug!(delay_ms = delay.as_millis() as u64, "waiting for pacing slot");
        tokio::time::sleep_until(ready_at).await;

        let granted = Instant::now();
        state.last_action_at = Some(granted);
        if self.max_per_minute.is_some() {
            state.recent.push_back(granted);
        }
        granted - started
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn min_greater_than_max_is_configuration_error() {
        let err = PacingGovernor::new(secs(5), secs(2)).err().unwrap();
        assert!(matches!(err, EngageError::Configuration(_)));
    }

    #[test]
    fn zero_rate_cap_is_configuration_error() {
        let gov = PacingGovernor::new(secs(1), secs(2)).unwrap();
        assert!(gov.with_max_per_minute(0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn first_slot_waits_one_sampled_delay() {
        let gov = PacingGovernor::new(secs(2), secs(5)).unwrap().with_seed(7);
        let waited = gov.wait_slot().await;
        assert!(waited >= secs(2) && waited <= secs(5), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn equal_bounds_give_fixed_spacing() {
        let gov = PacingGovernor::new(secs(3), secs(3)).unwrap();
        let start = Instant::now();
        gov.wait_slot().await;
        gov.wait_slot().await;
        assert_eq!(Instant::now() - start, secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_gaps_stay_within_bounds() {
        let gov = PacingGovernor::new(secs(2), secs(5)).unwrap().with_seed(42);
        let mut grants = Vec::new();
        for _ in 0..20 {
            gov.wait_slot().await;
            grants.push(Instant::now());
        }
        for pair in grants.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= secs(2), "gap {gap:?} below min");
            assert!(gap <= secs(5), "gap {gap:?} above max");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_requests_are_serialized() {
        let gov = Arc::new(PacingGovernor::new(secs(2), secs(4)).unwrap().with_seed(1));
        let mut handles = Vec::new();
        for _ in 0..6 {
            let gov = Arc::clone(&gov);
            handles.push(tokio::spawn(async move {
                gov.wait_slot().await;
                Instant::now()
            }));
        }
        let mut grants = Vec::new();
        for h in handles {
            grants.push(h.await.unwrap());
        }
        grants.sort();
        for pair in grants.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= secs(2), "concurrent gap {gap:?} below min");
            assert!(gap <= secs(4), "concurrent gap {gap:?} above max");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_counts_toward_the_gap() {
        let gov = PacingGovernor::new(secs(2), secs(2)).unwrap();
        gov.wait_slot().await;
        tokio::time::sleep(secs(10)).await;
        assert_eq!(gov.wait_slot().await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_cap_delays_past_the_window() {
        let gov = PacingGovernor::new(secs(1), secs(1))
            .unwrap()
            .with_max_per_minute(3)
            .unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            gov.wait_slot().await;
        }
        assert_eq!(Instant::now() - start, secs(3));
        // Fourth slot must wait until the first grant (t=1s) ages out at t=61s
        gov.wait_slot().await;
        assert_eq!(Instant::now() - start, secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_wait_does_not_commit_a_slot() {
        let gov = PacingGovernor::new(secs(5), secs(5)).unwrap();
        gov.wait_slot().await;
        let first = Instant::now();
        let _ = tokio::time::timeout(secs(1), gov.wait_slot()).await;
        // The abandoned wait left last_action_at untouched
        gov.wait_slot().await;
        assert_eq!(Instant::now() - first, secs(5));
    }
}
