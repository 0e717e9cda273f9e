//! Exponential backoff around remote catalog calls.
//!
//! Network failures and 5xx responses are retried; 4xx responses are returned
//! immediately since repeating them will not help.
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::FetchRetryConfig;
use crate::error::Result;

impl FetchRetryConfig {
    /// Delay before retry number `attempt` (0-based): `minTimeout * factor^attempt`,
    /// capped at `maxTimeout`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let millis = self.min_timeout as f64 * self.factor.max(1.0).powi(attempt as i32);
        Duration::from_millis(millis.min(self.max_timeout as f64) as u64)
    }
}

#[tracing::instrument(level = "debug", skip(policy, op))]
pub async fn with_retry<F, Fut, T>(policy: &FetchRetryConfig, what: &str, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retries = if policy.enabled { policy.retries } else { 0 };
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retries => {
                let delay = policy.backoff(attempt);
                warn!("{what} failed ({e}), retry {} of {retries} in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
