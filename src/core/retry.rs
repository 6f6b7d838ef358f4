//! Retry logic with exponential backoff
//!
//! This module wraps a single idempotent commit call that can fail while the
//! destination is still processing an upload. The caller supplies the
//! classification of "not ready" errors; everything else fails on the first
//! attempt.

use crate::core::error::PublishError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The destination is not ready yet; the same call may succeed later
    Transient,
    /// Any other failure; never retried
    Permanent,
}

/// Terminal failure of a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    /// Error returned by the last attempt
    pub error: E,
    /// Number of attempts made, including the failing one
    pub attempts: u32,
    /// True when every attempt failed transiently and the budget ran out
    pub exhausted: bool,
}

/// States of a retried call
#[derive(Debug)]
enum RetryState<E> {
    Attempting,
    TransientFailure(E),
    PermanentFailure { error: E, exhausted: bool },
}

/// Bounded exponential backoff for eventually-ready commit calls
///
/// # Examples
///
/// ```no_run
/// use video_publisher::core::{ErrorClass, RetryPolicy};
///
/// #[tokio::main]
/// async fn main() {
///     let policy = RetryPolicy::default();
///
///     let result = policy
///         .run(
///             || async { Ok::<_, String>("published") },
///             |error: &String| {
///                 if error.contains("not ready") {
///                     ErrorClass::Transient
///                 } else {
///                     ErrorClass::Permanent
///                 }
///             },
///         )
///         .await;
///
///     assert!(result.is_ok());
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Backoff multiplier applied after every transient failure
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(2000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
        }
    }

    /// Build a policy, rejecting multipliers that are not finite or below 1.0
    pub fn try_new(
        max_attempts: u32,
        initial_delay: Duration,
        backoff_multiplier: f64,
    ) -> Result<Self, PublishError> {
        if !backoff_multiplier.is_finite() || backoff_multiplier < 1.0 {
            return Err(PublishError::ConfigError(format!(
                "retry.multiplier は 1.0 以上の有限値である必要があります (実際: {})",
                backoff_multiplier
            )));
        }
        Ok(Self::new(max_attempts, initial_delay, backoff_multiplier))
    }

    /// Delay that follows `delay`, saturating instead of overflowing
    ///
    /// A multiplier that would shrink the delay or is not a number keeps the
    /// delay unchanged.
    fn next_delay(&self, delay: Duration) -> Duration {
        let secs = delay.as_secs_f64() * self.backoff_multiplier;
        if secs.is_nan() || secs < delay.as_secs_f64() {
            return delay;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Total time spent sleeping when every attempt fails transiently
    ///
    /// With the defaults this is 2 + 4 + 8 + 16 = 30 seconds.
    pub fn max_total_delay(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut delay = self.initial_delay;
        for _ in 1..self.max_attempts.max(1) {
            total = total.saturating_add(delay);
            delay = self.next_delay(delay);
        }
        total
    }

    /// Execute the operation, retrying only errors classified as transient
    ///
    /// # Arguments
    ///
    /// * `operation` - Async closure performing one attempt of the call
    /// * `classify` - Decides whether a failed attempt is transient
    pub async fn run<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        classify: C,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> ErrorClass,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt: u32 = 1;
        let mut delay = self.initial_delay;
        let mut state = RetryState::Attempting;

        loop {
            state = match state {
                RetryState::Attempting => match operation().await {
                    Ok(value) => {
                        if attempt > 1 {
                            tracing::info!(attempts = attempt, "Operation succeeded after retry");
                        }
                        return Ok(value);
                    }
                    Err(error) => match classify(&error) {
                        ErrorClass::Transient => RetryState::TransientFailure(error),
                        ErrorClass::Permanent => RetryState::PermanentFailure {
                            error,
                            exhausted: false,
                        },
                    },
                },
                RetryState::TransientFailure(error) if attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Destination not ready, retrying after backoff"
                    );
                    sleep(delay).await;
                    delay = self.next_delay(delay);
                    attempt += 1;
                    RetryState::Attempting
                }
                RetryState::TransientFailure(error) => RetryState::PermanentFailure {
                    error,
                    exhausted: true,
                },
                RetryState::PermanentFailure { error, exhausted } => {
                    if exhausted {
                        tracing::error!(attempts = attempt, error = %error, "Retry budget exhausted");
                    }
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                        exhausted,
                    });
                }
            };
        }
    }
}
