//! Bounded exponential-backoff execution for eventually consistent reads.
//!
//! Some reads only become visible a short while after the write that produced
//! them (a freshly uploaded object's download URL is the typical case).
//! [`run_with_backoff`] retries such an operation a bounded number of times,
//! sleeping `base_delay * backoff_factor^(k - 2)` before attempt `k >= 2`.
//! Attempt 1 runs immediately.
//!
//! Authentication exchanges must never be routed through this helper: replaying
//! them can re-trigger user-visible UI.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::platform::runtime;
use crate::util::logger::LOGGER;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MILLIS: u64 = 500;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay applied before the second attempt.
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MILLIS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Delay slept before the given 1-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(i32::MAX as u32) as i32;
        let nanos = self.base_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent);
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::from_nanos(nanos.round() as u64)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(format!(
                "backoff_factor must be a finite value >= 1.0 (got {})",
                self.backoff_factor
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// The policy cannot be executed; no attempt was made.
    InvalidPolicy(String),
    /// Every attempt failed. Carries the error of the final attempt.
    Exhausted { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn last_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::InvalidPolicy(_) => None,
        }
    }

    pub fn into_last_error(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::InvalidPolicy(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::InvalidPolicy(reason) => write!(f, "Invalid retry policy: {reason}"),
            RetryError::Exhausted {
                attempts,
                last_error,
            } => write!(f, "Gave up after {attempts} attempt(s): {last_error}"),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryError::Exhausted { last_error, .. } => Some(last_error),
            RetryError::InvalidPolicy(_) => None,
        }
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// The closure receives the 1-based attempt number.
pub async fn run_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    policy.validate().map_err(RetryError::InvalidPolicy)?;

    let mut attempt = 1;
    loop {
        runtime::sleep(policy.delay_for_attempt(attempt)).await;

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= policy.max_attempts => {
                LOGGER.warn(format!(
                    "Giving up after {attempt} attempt(s); last error: {err}"
                ));
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
            Err(err) => {
                LOGGER.warn(format!(
                    "Attempt {attempt}/{} failed, retrying in {:?}: {err}",
                    policy.max_attempts,
                    policy.delay_for_attempt(attempt + 1)
                ));
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    const BASE: Duration = Duration::from_millis(100);

    // The paused clock advances in whole timer ticks.
    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(2),
            "expected about {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn first_attempt_has_no_delay() {
        let policy = RetryPolicy::new(5, BASE);
        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), BASE);
        assert_eq!(policy.delay_for_attempt(3), BASE * 2);
        assert_eq!(policy.delay_for_attempt(4), BASE * 4);
    }

    #[test]
    fn huge_attempt_numbers_saturate() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::MAX);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn succeeds_on_third_attempt_after_doubling_delay() {
        let policy = RetryPolicy::new(5, BASE);
        let started = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&started);

        let result = run_with_backoff(&policy, move |attempt| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(Instant::now());
                if attempt < 3 {
                    Err(format!("not visible yet ({attempt})"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        let started = started.lock().unwrap();
        assert_eq!(started.len(), 3);
        assert_close(started[1] - started[0], BASE);
        assert_close(started[2] - started[1], BASE * 2);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn exhaustion_surfaces_last_error() {
        let policy = RetryPolicy::new(3, BASE);

        let result: Result<(), _> =
            run_with_backoff(&policy, |attempt| async move { Err(format!("failure {attempt}")) })
                .await;

        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last_error: "failure 3".to_string()
            })
        );
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn single_attempt_policy_does_not_retry() {
        let policy = RetryPolicy::new(1, BASE);
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let start = Instant::now();

        let result: Result<(), RetryError<String>> = run_with_backoff(&policy, move |_| {
            *counter.lock().unwrap() += 1;
            async { Err("boom".to_string()) }
        })
        .await;

        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(result.unwrap_err().into_last_error().as_deref(), Some("boom"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn zero_attempts_fail_before_running() {
        let policy = RetryPolicy::new(0, BASE);
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);

        let result: Result<(), RetryError<String>> = run_with_backoff(&policy, move |_| {
            *counter.lock().unwrap() += 1;
            async { Ok(()) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::InvalidPolicy(_))));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn shrinking_factor_is_rejected() {
        let policy = RetryPolicy::new(3, BASE).with_backoff_factor(0.5);
        let result: Result<(), RetryError<String>> =
            run_with_backoff(&policy, |_| async { Ok(()) }).await;
        assert!(matches!(result, Err(RetryError::InvalidPolicy(_))));
    }
}
