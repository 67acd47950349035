//! Bounded retries with exponential backoff and jitter
//!
//! [`Retryer::run`] drives an operation through at most `max_retries + 1`
//! attempts. Only errors classified as temporary are retried, and the loop
//! never sleeps after its last attempt.

use crate::error::{Error, Result};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry limits, fixed at client construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Cap on any single backoff
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: u32, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            max_backoff,
        }
    }

    /// Backoff before retrying after attempt `attempt` (0-based), for a
    /// given jitter in `[0, 1)` seconds.
    ///
    /// `min(2^(attempt + 1) + jitter, max_backoff)`
    pub fn backoff_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        // 2^63 seconds already dwarfs any sane cap
        let exponent = attempt.saturating_add(1).min(63) as i32;
        let secs = 2f64.powi(exponent) + jitter.clamp(0.0, 1.0);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Backoff before retrying after attempt `attempt`, with random jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        self.backoff_with_jitter(attempt, jitter)
    }
}

/// Outcome of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Temporary,
    Permanent,
}

/// Ephemeral record of one attempt, only used for logging
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    /// 0-based attempt index
    pub index: u32,
    pub outcome: AttemptOutcome,
    /// Sleep before the next attempt, if there is one
    pub backoff: Option<Duration>,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {} {:?}", self.index + 1, self.outcome)?;
        if let Some(backoff) = self.backoff {
            write!(f, ", retrying in {backoff:?}")?;
        }
        Ok(())
    }
}

/// Executes operations under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct Retryer {
    policy: RetryPolicy,
}

impl Retryer {
    /// Create a retryer for the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy this retryer enforces
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of
    /// attempts. The operation receives the 0-based attempt index.
    ///
    /// The backoff sleep races against `cancel`; cancellation during a sleep
    /// returns [`Error::Cancelled`] instead of the last failure.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut index = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let err = match operation(index).await {
                Ok(value) => {
                    if index > 0 {
                        debug!(attempts = index + 1, "Request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_temporary() {
                let attempt = Attempt {
                    index,
                    outcome: AttemptOutcome::Permanent,
                    backoff: None,
                };
                debug!(status = ?err.status(), "{attempt}: not retrying");
                return Err(err);
            }

            if index >= self.policy.max_retries {
                warn!(
                    status = ?err.status(),
                    max_retries = self.policy.max_retries,
                    "Retries exhausted"
                );
                return Err(err);
            }

            let delay = self.policy.backoff(index);
            let attempt = Attempt {
                index,
                outcome: AttemptOutcome::Temporary,
                backoff: Some(delay),
            };
            warn!(status = ?err.status(), error = %err, "{attempt}");

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            index += 1;
        }
    }
}
