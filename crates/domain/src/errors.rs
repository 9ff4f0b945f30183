//! Error types used throughout the gateway

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for configuration and wiring failures.
///
/// Upstream call failures are not represented here; those are normalized
/// into [`crate::types::GatewayError`] so callers always receive an
/// [`crate::types::ErrorKind`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;
