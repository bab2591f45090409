use super::shutdown::Shutdown;
use crate::error::StockWatchError;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Retries on top of the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// `2^attempt` seconds: 2s, 4s, 8s.
pub fn exponential_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Retry-with-backoff wrapper, independent of what is being retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: fn(u32) -> Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_RETRIES, exponential_backoff)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: fn(u32) -> Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }

    /// Runs `op` until it succeeds, fails with an error `is_retryable` rejects,
    /// or the retries run out. Both the operation and the backoff delays give
    /// way to `shutdown`, yielding [`StockWatchError::Cancelled`].
    pub async fn run<T, F, Fut, P>(
        &self,
        shutdown: &Shutdown,
        mut op: F,
        is_retryable: P,
    ) -> Result<T, StockWatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StockWatchError>>,
        P: Fn(&StockWatchError) -> bool,
    {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(StockWatchError::Cancelled),
                result = op() => result,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    let delay = self.delay(attempt);
                    warn!(
                        "Attempt {} of {} failed: {}. Retrying in {}s...",
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay.as_secs_f64()
                    );
                    if !shutdown.sleep(delay).await {
                        return Err(StockWatchError::Cancelled);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
