//! Resilience patterns for transient failures
//!
//! This module provides **generic, reusable** retry primitives:
//! - **Backoff**: fixed or exponential delay between attempts
//! - **Jitter**: randomization so concurrent callers do not retry in lockstep
//! - **Retry executor**: runs an async operation under an attempt budget,
//!   consulting a [`RetryPolicy`] after every failure
//!
//! The executor is generic over the error type. Callers encode their own
//! retry rules as a policy (the gateway's method/failure table, the session
//! issuer's transient-error check) and keep classification out of this
//! crate.

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
