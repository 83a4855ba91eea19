//! Retry policy wrapped around single-attempt transports.
//!
//! Only failures where a fresh attempt may succeed are retried: DNS failures,
//! refused connections and timeouts. A cancelled execution is never retried,
//! including while waiting out a backoff.

use crate::executor::Transport;
use crate::models::{ExecutionOutcome, RequestSpec};
use log::debug;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Upper bound for a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How many times to attempt an execution and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each further attempt.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// A policy making at most `max_attempts` attempts.
    ///
    /// `max_attempts` is raised to 1 and `multiplier` to 1.0 when lower.
    pub fn new(max_attempts: u32, initial_backoff: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::from_millis(500), 2.0)
    }

    /// Whether `outcome` of attempt number `attempt` (1-based) warrants another try.
    pub fn should_retry(&self, outcome: &ExecutionOutcome, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        match outcome {
            ExecutionOutcome::NetworkFailure { kind, .. } => kind.is_transient(),
            ExecutionOutcome::Timeout { .. } => true,
            ExecutionOutcome::Success { .. } | ExecutionOutcome::Cancelled { .. } => false,
        }
    }

    /// Delay before attempt `attempt + 1`.
    ///
    /// Always within `0..=MAX_BACKOFF`, even when the public fields were set
    /// directly to values [`RetryPolicy::new`] would have rejected.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        // f64::max maps NaN to the other operand
        Duration::from_secs_f64(secs.max(0.0).min(MAX_BACKOFF.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Runs `spec` through `transport` until it succeeds, fails for good, or
/// `policy` runs out of attempts.
///
/// Returns the final outcome and the number of attempts made.
pub async fn execute_with_retry<T: Transport>(
    transport: &T,
    spec: &RequestSpec,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> (ExecutionOutcome, u32) {
    let start = Instant::now();
    let mut attempt = 1;

    loop {
        let outcome = transport.execute(spec.clone(), cancel.clone()).await;
        if !policy.should_retry(&outcome, attempt) {
            return (outcome, attempt);
        }

        let delay = policy.backoff(attempt);
        debug!(
            "{} attempt {} failed ({}), retrying in {:?}",
            spec,
            attempt,
            outcome.summary(),
            delay
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                return (
                    ExecutionOutcome::Cancelled {
                        elapsed: start.elapsed(),
                    },
                    attempt,
                );
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
