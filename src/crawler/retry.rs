//! Bounded retry with linear backoff
//!
//! `RetryPolicy` knows nothing about HTTP. It asks each error for its
//! [`Disposition`] and decides whether to retry, wait, or give up.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// How a failed attempt should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Already waited out by the caller; retry immediately, free of charge
    RateLimited,
    /// Retry after backoff, consuming one attempt
    Transient,
    /// Do not retry
    Permanent,
}

/// Classifier implemented by errors that flow through a [`RetryPolicy`]
pub trait Retryable {
    fn disposition(&self) -> Disposition;
}

/// Final failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("permanent failure: {0}")]
    Permanent(E),
}

impl<E> RetryError<E> {
    /// The error returned by the last attempt
    pub fn last_error(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Permanent(e) => e,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Retry budget and backoff schedule for one logical fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_retries` counted attempts
    ///
    /// After the n-th failed attempt the policy waits `n * backoff_unit`.
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay after the given failed attempt (1-based)
    ///
    /// # Example
    ///
    /// ```
    /// use pr_crawler::crawler::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(10));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(30));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Runs `operation` until it succeeds or the budget is spent
    ///
    /// # Retry Logic
    ///
    /// | Disposition | Action |
    /// |-------------|--------|
    /// | RateLimited | Retry immediately, attempt not counted |
    /// | Transient | Wait `n * unit` after failed attempt n; give up after `max_retries` attempts |
    /// | Permanent | Stop, return `RetryError::Permanent` |
    ///
    /// The backoff is also taken after the final attempt, so a caller that
    /// gives up does not hit the server again straight away.
    pub async fn attempt<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let mut attempts = 0;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match error.disposition() {
                Disposition::RateLimited => {
                    tracing::debug!("{}: rate limit waited out, retrying", label);
                }
                Disposition::Permanent => {
                    tracing::debug!("{}: permanent failure: {}", label, error);
                    return Err(RetryError::Permanent(error));
                }
                Disposition::Transient => {
                    attempts += 1;
                    let delay = self.delay_for(attempts);
                    tracing::warn!(
                        "{}: {}. Attempt {}/{} failed, waiting {:?}",
                        label,
                        error,
                        attempts,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;

                    if attempts >= self.max_retries {
                        return Err(RetryError::Exhausted {
                            attempts,
                            last: error,
                        });
                    }
                }
            }
        }
    }
}
