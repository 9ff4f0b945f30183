//! Generic retry strategy implementation
//!
//! Runs an async operation under an attempt budget. After each failure a
//! [`RetryPolicy`] decides whether to try again; delays come from a
//! [`BackoffStrategy`] with optional [`Jitter`]. Sleeping goes through
//! `tokio::time`, so paused-clock tests observe the real schedule.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted
    #[error("All retry attempts exhausted after {attempts} tries, last error: {last:?}")]
    AttemptsExhausted { attempts: u32, last: E },

    /// The operation failed with an error the policy refused to retry
    #[error("Operation failed with non-retryable error after {attempts} tries: {error:?}")]
    NonRetryable { attempts: u32, error: E },

    /// The retry strategy configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> RetryError<E> {
    /// The last error produced by the operation, if one exists
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { last, .. } => Some(last),
            Self::NonRetryable { error, .. } => Some(error),
            Self::InvalidConfiguration { .. } => None,
        }
    }

    pub const fn attempts(&self) -> u32 {
        match self {
            Self::AttemptsExhausted { attempts, .. } | Self::NonRetryable { attempts, .. } => {
                *attempts
            }
            Self::InvalidConfiguration { .. } => 0,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    pub attempts: u32,
    pub total_delay: Duration,
    pub elapsed: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }

    pub const fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether the error should be retried.
    ///
    /// `attempt` is the zero-based index of the attempt that failed.
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * base^attempt, capped at max_delay
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    pub const fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::Exponential { initial_delay, base: 2.0, max_delay }
    }

    /// Calculate the delay after the given zero-based attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let delay = initial_delay.as_millis() as f64 * base.powi(exponent);
                let capped = delay.min(max_delay.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(self, delay: Duration) -> Duration {
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Equal => {
                let half = delay_ms / 2;
                Duration::from_millis(half + random_up_to(delay_ms - half))
            }
        }
    }
}

fn random_up_to(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..=max)
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::exponential(
                Duration::from_millis(200),
                Duration::from_secs(5),
            ),
            jitter: Jitter::Equal,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns `RetryError::InvalidConfiguration` for a zero attempt budget or
    /// a non-positive exponential base.
    pub fn validate(&self) -> Result<(), RetryError<()>> {
        if self.max_attempts == 0 {
            return Err(RetryError::InvalidConfiguration {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }

        match &self.backoff {
            BackoffStrategy::Exponential { base, .. } if *base <= 0.0 => {
                Err(RetryError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Jittered delay to wait after the given zero-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.backoff.calculate_delay(attempt))
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    #[must_use]
    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    #[must_use]
    pub const fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    #[must_use]
    pub const fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    /// # Errors
    /// Returns `RetryError::InvalidConfiguration` if validation fails.
    pub fn build(self) -> Result<RetryConfig, RetryError<()>> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_notify(operation, |_, _, _| {}).await
    }

    /// Execute an operation, calling `on_retry(error, attempt, delay)` before
    /// each backoff sleep.
    ///
    /// `attempt` is the one-based number of the attempt that just failed.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_notify<F, Fut, T, E, N>(
        &self,
        mut operation: F,
        mut on_retry: N,
    ) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Debug,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(&E, u32, Duration),
    {
        let start = Instant::now();
        let mut total_delay = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            let attempt_number = attempt + 1;
            debug!(attempt = attempt_number, "Executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt_number,
                        total_delay,
                        elapsed: start.elapsed(),
                    };
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt = attempt_number, error = ?error, "Retry policy stopped retries");
                    return RetryOutcome {
                        result: Err(RetryError::NonRetryable {
                            attempts: attempt_number,
                            error,
                        }),
                        attempts: attempt_number,
                        total_delay,
                        elapsed: start.elapsed(),
                    };
                }
                _ if attempt_number >= self.config.max_attempts => {
                    warn!(attempts = attempt_number, error = ?error, "All retry attempts exhausted");
                    return RetryOutcome {
                        result: Err(RetryError::AttemptsExhausted {
                            attempts: attempt_number,
                            last: error,
                        }),
                        attempts: attempt_number,
                        total_delay,
                        elapsed: start.elapsed(),
                    };
                }
                RetryDecision::Retry => self.config.delay_for(attempt),
                RetryDecision::RetryAfter(custom_delay) => custom_delay,
            };

            on_retry(&error, attempt_number, delay);
            debug!(attempt = attempt_number, delay_ms = delay.as_millis() as u64, "Retrying");

            tokio::time::sleep(delay).await;
            total_delay += delay;
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Predicate-based retry policy
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E, u32) -> bool,
    {
        fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision {
            if (self.predicate)(error, attempt) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for backoff, jitter, and executor behavior

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::policies::{AlwaysRetry, PredicateRetry};
    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .fixed_backoff(Duration::from_millis(10))
            .no_jitter()
            .build()
            .unwrap()
    }

    #[test]
    fn test_backoff_strategy_fixed() {
        let strategy = BackoffStrategy::Fixed(Duration::from_millis(100));

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(5), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_strategy_exponential() {
        let strategy =
            BackoffStrategy::exponential(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(800));

        // Should cap at max_delay
        assert_eq!(strategy.calculate_delay(20), Duration::from_secs(10));
        assert_eq!(strategy.calculate_delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_bounds() {
        let delay = Duration::from_millis(100);

        assert_eq!(Jitter::None.apply(delay), delay);
        for _ in 0..50 {
            let equal = Jitter::Equal.apply(delay);
            assert!(equal >= Duration::from_millis(50));
            assert!(equal <= delay);
        }
        assert_eq!(Jitter::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_retry_config_validation() {
        let mut config = RetryConfig::default();
        assert!(config.validate().is_ok());

        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let result = RetryConfig::builder()
            .exponential_backoff(Duration::from_millis(1), 0.0, Duration::from_secs(1))
            .build();
        assert!(matches!(result, Err(RetryError::InvalidConfiguration { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_executor_succeeds_after_failures() {
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = executor
            .execute_with_outcome(|| {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.retries(), 2);
        assert_eq!(outcome.total_delay, Duration::from_millis(20));
        assert_eq!(outcome.result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_executor_exhausts_attempts_with_last_error() {
        let executor = RetryExecutor::new(fast_config(3), AlwaysRetry);
        let calls = Arc::new(AtomicU32::new(0));

        let result: RetryResult<(), u32> = executor
            .execute(|| {
                let calls = calls.clone();
                async move { Err(calls.fetch_add(1, Ordering::SeqCst)) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(err.into_last_error(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_executor_stops_on_fatal_error() {
        let executor =
            RetryExecutor::new(fast_config(5), PredicateRetry::new(|_: &&str, _: u32| false));
        let calls = Arc::new(AtomicU32::new(0));

        let result: RetryResult<(), &str> = executor
            .execute(|| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, error: "fatal" })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_executor_with_predicate_retry() {
        let policy = PredicateRetry::new(|err: &&str, _attempt: u32| *err == "transient");
        let executor = RetryExecutor::new(fast_config(5), policy);
        let calls = Arc::new(AtomicU32::new(0));

        let result: RetryResult<(), &str> = executor
            .execute(|| {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("transient")
                    } else {
                        Err("permanent")
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 2, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff_and_notifies() {
        struct After;
        impl RetryPolicy<&'static str> for After {
            fn should_retry(&self, _error: &&'static str, _attempt: u32) -> RetryDecision {
                RetryDecision::RetryAfter(Duration::from_secs(2))
            }
        }

        let executor = RetryExecutor::new(fast_config(2), After);
        let mut notified = Vec::new();

        let outcome = executor
            .execute_notify(
                || async { Err::<(), _>("busy") },
                |err, attempt, delay| notified.push((*err, attempt, delay)),
            )
            .await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.total_delay, Duration::from_secs(2));
        assert_eq!(notified, vec![("busy", 1, Duration::from_secs(2))]);
    }
}
