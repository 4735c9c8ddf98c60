//! Retry utilities with exponential backoff, cap, and optional jitter.
//!
//! Every remote-store call is routed through a [`CallExecutor`]. The
//! executor retries only errors the store adapter classified as transient,
//! sleeping `base_delay * 2^attempt` between attempts, and gives up with the
//! last transient error once the attempt budget is spent. An overall
//! deadline bounds the total wait under sustained throttling.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::time::Instant;
use tracing::{error, warn};

use crate::storage::StoreError;

/// Configuration for retry behavior.
///
/// The defaults give six attempts separated by 0.5, 1, 2, 4 and 8 seconds.
/// No sleep follows the last attempt, so a call that keeps failing
/// transiently gives up after 15.5 s of backoff; the 16 s cap only comes
/// into play when `max_attempts` is raised above six.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Maximum delay cap (before jitter).
    pub max_delay: Duration,
    /// Total attempts including the first (1 = no retries).
    pub max_attempts: u32,
    /// Add random jitter on top of each delay.
    pub jitter: bool,
    /// Overall bound on one call including all retries. `None` = unbounded.
    pub deadline: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(16),
            max_attempts: 6,
            jitter: false,
            deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay after a given failed attempt (0-indexed).
    ///
    /// Uses exponential backoff: delay = base * 2^attempt, capped at max_delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential_ms = base_ms.saturating_mul(1u64 << attempt.min(20));
        let capped_ms = exponential_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped_ms)
    }

    /// Number of sleeps between attempts.
    pub fn max_retries(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }

    /// Backoff schedule for `backon`.
    ///
    /// Yields `max_attempts - 1` delays; no sleep follows the final attempt.
    pub fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_retries() as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Retrying call executor for remote-store operations.
#[derive(Debug, Clone, Default)]
pub struct CallExecutor {
    config: RetryConfig,
}

impl CallExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `call` until it succeeds, fails permanently, exhausts the
    /// attempt budget, or passes the deadline.
    ///
    /// `operation` names the call in logs.
    pub async fn execute<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts;
        let mut attempt: u32 = 0;

        let retried = call
            .retry(self.config.backoff())
            .when(StoreError::is_transient)
            .notify(|err: &StoreError, delay: Duration| {
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient store failure, retrying"
                );
            });

        let result = match self.config.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, retried).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::DeadlineExceeded {
                    elapsed: start.elapsed(),
                }),
            },
            None => retried.await,
        };

        if let Err(e) = &result {
            error!(
                operation,
                elapsed_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Store call failed"
            );
        }

        result
    }
}
