//! Opt-in retry and bounded-poll helpers.
//!
//! Neither helper is wired into the client automatically; callers that want
//! resilience wrap their calls explicitly. Authentication failures are
//! never retried, so the caller can redirect to login right away.

use crate::error::OrchestratorResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Default total attempts for the retry helper.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;
/// Ceiling on any single backoff delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Configuration for [`retry_with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after every failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): initial * 2^attempt,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(16);
        let multiplier = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay.as_millis() as u64))
    }
}

/// Runs `f` until it succeeds or the attempt budget is spent, doubling the
/// delay after every failure.
///
/// Authentication errors short-circuit: they propagate on the attempt that
/// produced them with no further calls. After the final failed attempt the
/// last error is returned as-is.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    f: F,
) -> OrchestratorResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = OrchestratorResult<T>>,
{
    let budget = config.max_retries.max(1);
    let mut attempt: u32 = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt = attempt + 1, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_authentication() => {
                debug!(operation, "Authentication failure, not retrying");
                return Err(err);
            }
            Err(err) => {
                if attempt + 1 >= budget {
                    warn!(operation, attempts = attempt + 1, error = %err, "Retries exhausted");
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Call failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Configuration for [`poll_until`].
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of attempts before giving up. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Polls `f` at a fixed cadence until it yields a value or the attempt
/// budget is spent.
///
/// `Ok(None)` from `f` means "not there yet" and schedules another attempt;
/// errors propagate immediately. Returns `Ok(None)` once the budget is
/// exhausted, leaving the interpretation of absence to the caller.
pub async fn poll_until<F, Fut, T>(
    config: &PollConfig,
    operation: &str,
    f: F,
) -> OrchestratorResult<Option<T>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = OrchestratorResult<Option<T>>>,
{
    let budget = config.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        if let Some(value) = f().await? {
            return Ok(Some(value));
        }
        attempt += 1;
        if attempt >= budget {
            debug!(operation, attempts = attempt, "Poll exhausted without a result");
            return Ok(None);
        }
        debug!(operation, attempt, "Not available yet, polling again");
        sleep(config.delay).await;
    }
}
