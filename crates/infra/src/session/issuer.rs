//! Session issuing channel
//!
//! A [`SessionIssuer`] turns the long-lived host credential into a fresh
//! ingress session string. The token manager decides when to call it and
//! how often to retry.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Failures while obtaining a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueError {
    #[error("could not reach session issuer: {0}")]
    Connect(String),

    #[error("session issuer rejected the host credential: {0}")]
    Rejected(String),

    #[error("unexpected response from session issuer: {0}")]
    Protocol(String),

    #[error("session issuing timed out after {0:?}")]
    Timeout(Duration),

    /// The refresh task ended without producing a result
    #[error("session refresh interrupted: {0}")]
    Interrupted(String),
}

impl IssueError {
    /// Whether another attempt within the same refresh may succeed.
    ///
    /// A rejected host credential will be rejected again until the
    /// configuration changes.
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Source of fresh ingress sessions
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    /// Obtain a new session value.
    ///
    /// # Errors
    /// Returns [`IssueError`] if no session could be obtained.
    async fn issue(&self) -> Result<String, IssueError>;
}
