//! Bounded retry around a single fetch attempt
//!
//! [`RetryPolicy::run`] drives an attempt closure that reports one of four
//! outcomes. Only [`Attempt::Transient`] waits for the backoff before the next
//! attempt; [`Attempt::Skip`] retries immediately and [`Attempt::Abort`] stops.

use crate::config::AcquisitionConfig;
use crate::error::ScraperError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of one attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The attempt produced a value
    Done(T),
    /// Nothing usable this time, try again without waiting
    Skip,
    /// Transient failure, wait the backoff and try again
    Transient(ScraperError),
    /// Give up on this operation
    Abort(ScraperError),
}

/// Final outcome of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// Every attempt was used without producing a value
    Exhausted {
        attempts: u32,
        last_error: Option<ScraperError>,
    },
    Aborted { attempts: u32, error: ScraperError },
}

impl<T> RetryOutcome<T> {
    /// The produced value, if any
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Exhausted { .. } | Self::Aborted { .. } => None,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Aborted { attempts, .. } => *attempts,
        }
    }
}

/// Maximum attempts and the fixed delay after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Create a policy; at least one attempt is always made
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    #[must_use]
    pub fn from_config(config: &AcquisitionConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `attempt` until it is done, aborts, or the attempts run out
    ///
    /// The closure receives the 1-based attempt number. No backoff is taken
    /// after the final attempt. Cancelling `cancel` interrupts a pending
    /// backoff and stops before the next attempt.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut attempt: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last_error = None;

        for number in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return RetryOutcome::Aborted {
                    attempts: number - 1,
                    error: ScraperError::Cancelled,
                };
            }

            match attempt(number).await {
                Attempt::Done(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: number,
                    }
                },
                Attempt::Abort(error) => {
                    return RetryOutcome::Aborted {
                        attempts: number,
                        error,
                    }
                },
                Attempt::Skip => {
                    tracing::trace!(attempt = number, "Attempt yielded nothing, retrying");
                },
                Attempt::Transient(error) => {
                    tracing::debug!(
                        attempt = number,
                        max_attempts = self.max_attempts,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %error,
                        "Transient failure"
                    );
                    last_error = Some(error);

                    if number < self.max_attempts {
                        tokio::select! {
                            () = tokio::time::sleep(self.backoff) => {},
                            () = cancel.cancelled() => {
                                return RetryOutcome::Aborted {
                                    attempts: number,
                                    error: ScraperError::Cancelled,
                                };
                            },
                        }
                    }
                },
            }
        }

        RetryOutcome::Exhausted {
            attempts: self.max_attempts,
            last_error,
        }
    }
}
