//! Exponential backoff with jitter for collaborator calls

use crate::traits::ProviderFailure;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry policy for transient collaborator failures.
///
/// The delay before retry `n` (zero based) is
/// `min(initial_backoff * 2^n, max_backoff)` plus a random jitter. Rate
/// limited failures draw their jitter from a wider window so that parallel
/// workers spread out instead of hitting the provider again in lockstep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    /// Base delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound for the exponential part in milliseconds
    pub max_backoff_ms: u64,
    /// Jitter window for ordinary transient failures, in milliseconds
    pub jitter_ms: (u64, u64),
    /// Jitter window for rate limited failures, in milliseconds
    pub rate_limit_jitter_ms: (u64, u64),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            jitter_ms: (0, 1_000),
            rate_limit_jitter_ms: (1_000, 3_000),
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt budget and default delays
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that retries without sleeping (tests)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter_ms: (0, 0),
            rate_limit_jitter_ms: (0, 0),
        }
    }

    /// Delay to wait after failed attempt `attempt` (zero based)
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let exponential = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_backoff_ms);

        let (lo, hi) = if rate_limited {
            self.rate_limit_jitter_ms
        } else {
            self.jitter_ms
        };
        let jitter = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };

        Duration::from_millis(exponential.saturating_add(jitter))
    }

    /// Longest time `retry` can take when every attempt runs into
    /// `attempt_timeout`, counting the largest possible backoff between
    /// attempts. A deadline placed around the whole retry loop must be at
    /// least this long or later attempts never run.
    pub fn budget(&self, attempt_timeout: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let widest_jitter = self.jitter_ms.1.max(self.rate_limit_jitter_ms.1);
        let backoff_ms: u64 = (0..attempts - 1)
            .map(|n| {
                self.initial_backoff_ms
                    .saturating_mul(2u64.saturating_pow(n))
                    .min(self.max_backoff_ms)
                    .saturating_add(widest_jitter)
            })
            .fold(0, u64::saturating_add);

        attempt_timeout.saturating_mul(attempts) + Duration::from_millis(backoff_ms)
    }

    /// Run `f` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent.
    pub async fn retry<F, Fut, T, E>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ProviderFailure,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() || attempt >= max_attempts {
                        if e.is_transient() {
                            warn!(operation, attempts = attempt, error = %e, "Operation failed after max attempts");
                        }
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt - 1, e.is_rate_limited());
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        rate_limited = e.is_rate_limited(),
                        error = %e,
                        "Operation failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
