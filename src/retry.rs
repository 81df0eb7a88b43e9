//! Backoff for transient fetch failures
//!
//! Retrying is off unless [`RetryConfig::max_attempts`] is raised. Only
//! network failures flagged transient (timeouts, refused connections, 5xx,
//! 429) are repeated. A malformed or empty payload is returned as-is.
//!
//! ```no_run
//! use ckan_dl::config::RetryConfig;
//! use ckan_dl::retry::with_retry;
//! use ckan_dl::{FetchError, ResourceFetcher, ResourceId, StructuredTable};
//!
//! # async fn example(fetcher: &dyn ResourceFetcher, id: &ResourceId) -> Result<StructuredTable, FetchError> {
//! let config = RetryConfig { max_attempts: 3, ..Default::default() };
//! let table = with_retry(&config, || fetcher.fetch(id)).await?;
//! # Ok(table)
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{ConversionError, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as worth another attempt
pub trait IsRetryable {
    /// True when repeating the same request may succeed
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, FetchError::NetworkFailure { transient: true, .. })
    }
}

impl IsRetryable for ConversionError {
    fn is_retryable(&self) -> bool {
        match self {
            ConversionError::Fetch(e) => e.is_retryable(),
            ConversionError::Write(_) => false,
        }
    }
}

/// Delay schedule: grows by `backoff_multiplier` per step, capped at `max_delay`
struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    fn new(config: &RetryConfig) -> Self {
        Self {
            next: config.initial_delay,
            max: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }

    /// Delay to sleep before the upcoming retry
    fn step(&mut self) -> Duration {
        let base = self.next.min(self.max);
        self.next = scale(base, self.multiplier).unwrap_or(self.max).min(self.max);
        if self.jitter { add_jitter(base) } else { base }
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out.
///
/// The operation runs once plus up to `max_attempts` retries. The last error
/// is returned unchanged.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut backoff = Backoff::new(config);
    let mut retries = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::info!(retries, "Request succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !err.is_retryable() || retries >= config.max_attempts {
            if retries > 0 {
                tracing::debug!(error = %err, retries, "Giving up after retries");
            }
            return Err(err);
        }

        retries += 1;
        let delay = backoff.step();
        tracing::warn!(
            error = %err,
            retry = retries,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// `delay * factor`, or `None` when the product does not fit a `Duration`
fn scale(delay: Duration, factor: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).ok()
}

/// Stretch `delay` by a random factor in `[1, 2]`, saturating at `delay` on overflow
fn add_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..=2.0);
    scale(delay, factor).unwrap_or(delay)
}
