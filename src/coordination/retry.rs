//! Bounded retry with exponential backoff
//!
//! An attempt either yields a value, yields nothing (an empty generation, a
//! non-200 search reply), or fails. Empty results and transient failures are
//! retried after `base * 2^(attempt - 1)` capped at `max_delay`. Permanent
//! failures are returned immediately. Exhaustion surfaces as
//! [`PicksError::RetriesExhausted`].

use crate::error::{PicksError, Result};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy for upstream calls
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    6
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(2u64.saturating_pow(exp));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Run `op` until it yields a value, the policy is exhausted, or it fails permanently.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, stage: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::from("empty response");

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(Some(value)) => {
                if attempt > 1 {
                    debug!(stage, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Ok(None) => {
                warn!(stage, attempt, max_attempts, "empty result, retrying");
                last_error = String::from("empty response");
            }
            Err(e) if e.is_transient() => {
                warn!(stage, attempt, max_attempts, error = %e, "transient failure, retrying");
                last_error = e.to_string();
            }
            Err(e) => return Err(e),
        }

        if attempt < max_attempts {
            let delay = policy.backoff_duration(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(PicksError::RetriesExhausted {
        stage: stage.to_string(),
        attempts: max_attempts,
        last_error,
    })
}

/// [`retry`] for text-producing calls: blank text counts as an empty result.
pub async fn retry_text<F, Fut>(policy: &RetryPolicy, stage: &str, mut op: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    retry(policy, stage, || {
        let fut = op();
        async move {
            let text = fut.await?;
            Ok(if text.trim().is_empty() { None } else { Some(text) })
        }
    })
    .await
}
