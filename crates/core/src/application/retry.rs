// Per-call retry policy: fixed exponential backoff, no jitter, driven by a
// literal {initial, multiplier, maxAttempts} triple rather than a
// jittered/deadline-aware formula.

use std::time::Duration;
use tracing::{info, warn};

use crate::port::CapabilityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            multiplier: 2,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// `attempt` is 1-based: the attempt number that just failed.
    pub fn decide(&self, attempt: u32, error: &CapabilityError) -> RetryDecision {
        if !error.is_retryable() {
            info!(attempt = %attempt, kind = ?error, "not retrying non-retryable error");
            return RetryDecision::GiveUp;
        }
        if attempt >= self.max_attempts {
            warn!(attempt = %attempt, max_attempts = %self.max_attempts, "retry attempts exhausted");
            return RetryDecision::GiveUp;
        }
        let delay_ms = self.initial_backoff_ms * (self.multiplier as u64).pow(attempt - 1);
        info!(attempt = %attempt, delay_ms = %delay_ms, "scheduling retry");
        RetryDecision::Retry(Duration::from_millis(delay_ms))
    }
}

/// Runs `call` up to `policy.max_attempts` times, sleeping the backoff between
/// attempts. Returns the last error if every attempt fails.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => match policy.decide(attempt, &err) {
                RetryDecision::Retry(delay) => {
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::GiveUp => return Err(err),
            },
        }
    }
}
