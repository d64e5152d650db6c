//! Caller-side retry with exponential backoff.
//!
//! Backends and [`QuoteService`](crate::QuoteService) never retry. Callers that want
//! retries wrap an operation in a [`RetryPolicy`]:
//!
//! ```no_run
//! # use quote_kit::{QuoteService, RetryPolicy, backend::EmbeddedBackend};
//! # use quote_kit::query::ListQuotesOptions;
//! # async fn example(service: QuoteService<EmbeddedBackend>) -> quote_kit::Result<()> {
//! let policy = RetryPolicy::for_environment(true);
//! let options = ListQuotesOptions::default();
//! let page = policy.run("list_quotes", || service.list_quotes(&options)).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Retries attempted in production builds.
pub const PRODUCTION_RETRIES: u32 = 2;

/// How many times to retry a failed operation, and how long to wait between tries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = no retry).
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 0,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_retries` times with the default base delay.
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        }
    }

    /// Two retries in production, none elsewhere.
    pub fn for_environment(production: bool) -> Self {
        if production {
            RetryPolicy::new(PRODUCTION_RETRIES)
        } else {
            RetryPolicy::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `retry` (1-based): `base_delay * 2^(retry-1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation`, retrying retryable failures.
    ///
    /// Only errors for which [`Error::is_retryable`](crate::Error::is_retryable) holds
    /// are retried; validation and not-found failures return immediately.
    ///
    /// # Errors
    /// Returns the last error once retries are exhausted, or the first non-retryable one.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_retries + 1;
        let mut attempts = 0;

        loop {
            attempts += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempts < max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}), retrying: {}",
                        operation, attempts, max_attempts, e
                    );
                    tokio::time::sleep(self.delay_for(attempts)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
