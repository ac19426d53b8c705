//! Centralized retry policy with exponential backoff.
//!
//! Both platform clients share one policy instead of scattering ad hoc retry
//! loops per call site. Only transient failures are retried: connection
//! failures and upstream 429/5xx responses. Authentication outcomes, client
//! errors, and timeouts pass through on the first occurrence.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::error::Error;
use rand::{Rng, rng};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Bounded-attempt exponential backoff parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    pub base_delay: Duration,
    /// Cap on the computed delay, jitter excluded.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: usize) -> Duration {
        let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

/// Run `operation`, retrying per `policy` while the failure
/// [`is_retryable`](Error::is_retryable).
///
/// `op_name` labels log lines; the operation closure is re-invoked for each
/// attempt.
#[instrument(level = "debug", skip(policy, operation))]
pub async fn with_backoff<T, F, Fut>(
    op_name: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;

                if !e.is_retryable() {
                    return Err(e);
                }
                if attempt > policy.max_retries {
                    error!(
                        op = op_name,
                        attempt,
                        max = policy.max_retries,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u128,
                        error = %e,
                        "operation exhausted retries"
                    );
                    return Err(e);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    max = policy.max_retries,
                    ?delay,
                    error = %e,
                    "attempt failed; backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
