//! Bounded retry for transient provider failures
//!
//! Transient failures are retried after a fixed delay until the attempt
//! budget is spent; the last failure is then surfaced as
//! `ProviderError::RetryExhausted`. Permanent failures return immediately.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Attempt budget and fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}

/// Run `operation` until it succeeds, fails permanently, or the budget runs out
///
/// # Arguments
/// * `operation_name` - Human readable name for logging (e.g. "movie metadata for 'Alien'")
/// * `policy` - Attempt budget and delay between attempts
/// * `operation` - Closure producing one attempt
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(ProviderError::Transient(message)) => {
                if attempt >= attempts {
                    return Err(ProviderError::RetryExhausted {
                        operation: operation_name.to_string(),
                        attempts,
                        last_error: message,
                    });
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = attempts,
                    error = %message,
                    "Failed to download {}. Trying again in {} s",
                    operation_name,
                    policy.delay.as_secs_f32()
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(other) => return Err(other),
        }
    }
}
