//! Infrastructure error types
//!
//! Failures of the I/O layer before they are classified into the gateway
//! taxonomy. Transport failures record whether the request could have
//! reached the backend, which decides whether a non-idempotent call may be
//! resent.

mod conversions;

use std::fmt;

use thiserror::Error;

/// How far a failed request got before the transport broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    /// Connection never established (refused, DNS failure); nothing was sent
    BeforeSend,
    /// The request may have been (partially) delivered
    AfterSend,
}

impl fmt::Display for SendPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeSend => f.write_str("before send"),
            Self::AfterSend => f.write_str("after send"),
        }
    }
}

/// Errors raised by the HTTP layer
#[derive(Debug, Clone, Error)]
pub enum InfraError {
    #[error("Transport error ({phase}): {message}")]
    Transport { phase: SendPhase, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The request could not be built (bad URL, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl InfraError {
    pub fn before_send(message: impl Into<String>) -> Self {
        Self::Transport { phase: SendPhase::BeforeSend, message: message.into() }
    }

    pub fn after_send(message: impl Into<String>) -> Self {
        Self::Transport { phase: SendPhase::AfterSend, message: message.into() }
    }
}
