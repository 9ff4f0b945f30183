//! Authenticated request gateway
//!
//! Attaches credentials, classifies outcomes and retries upstream calls.

pub mod auth;
pub mod client;
pub mod policy;

pub use auth::TokenSource;
pub use client::{Gateway, GatewaySettings, RequestExecutor};
pub use policy::{retry_allowed, AttemptFailure, FailureKind, Idempotency, RequestRetryPolicy};
