//! Exponential backoff retry for feed page fetches.
//!
//! A transient failure is retried after `initial_delay * multiplier^n`,
//! capped at `max_delay`, with no jitter. The default (3 retries, 500ms base)
//! waits 0.5s, 1s, 2s. Permanent errors are returned immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::FeedError;

/// Backoff policy for one page fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Three retries, 0.5s, 1s and 2s apart.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(4),
        backoff_multiplier: 2.0,
    };

    /// Delay before retry number `retry` (0-indexed).
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        let grown = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(retry as i32);
        Duration::from_secs_f64(grown.min(self.max_delay.as_secs_f64()))
    }
}

/// How a retried fetch ended.
#[derive(Debug)]
pub enum RetryResult<T> {
    Success(T),

    /// A transient error persisted through every retry.
    ExhaustedRetries {
        last_error: FeedError,
        /// Attempts made, including the first.
        attempts: u32,
    },

    /// A permanent error, returned without retrying.
    PermanentError(FeedError),
}

/// Runs `fetch` until it succeeds, fails permanently, or runs out of retries.
pub async fn retry_with_backoff<T, F, Fut>(config: RetryConfig, mut fetch: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut retries = 0;
    loop {
        let e = match fetch().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if !e.kind.is_transient() => return RetryResult::PermanentError(e),
            Err(e) => e,
        };
        if retries == config.max_retries {
            return RetryResult::ExhaustedRetries {
                last_error: e,
                attempts: retries + 1,
            };
        }

        let delay = config.delay_for_attempt(retries);
        retries += 1;
        if e.is_timeout() {
            warn!(
                offset = e.offset,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                "Feed page timed out, retrying"
            );
        } else {
            warn!(
                offset = e.offset,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Feed page failed, retrying"
            );
        }
        tokio::time::sleep(delay).await;
    }
}
