//! Generic utilities shared across the gateway crates.
//!
//! Currently hosts the resilience primitives (backoff, jitter, retry
//! executor) used by the request gateway and the session token manager.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

// Re-export commonly used types and traits for convenience
pub use resilience::{
    BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy,
};
