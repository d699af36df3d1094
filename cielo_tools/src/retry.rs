use std::{future::Future, time::Duration};

use log::*;

use crate::CieloApiError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_millis(1000), backoff_factor: 2 }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or the policy runs out of attempts.
/// The delay between attempts grows by `backoff_factor` each time.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, CieloApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CieloApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(v) => return Ok(v),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= attempts => {
                warn!("💳️ Giving up after {attempt} attempts. {e}");
                return Err(e);
            },
            Err(e) => {
                debug!("💳️ Attempt {attempt} of {attempts} failed, retrying in {}ms. {e}", delay.as_millis());
                tokio::time::sleep(delay).await;
                delay *= policy.backoff_factor;
                attempt += 1;
            },
        }
    }
}
