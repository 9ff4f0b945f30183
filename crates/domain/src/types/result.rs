//! Gateway results and the error taxonomy
//!
//! Every terminal outcome of an upstream call is classified into a
//! [`StatusClass`] and, for failures, exactly one [`ErrorKind`]. The raw
//! upstream body is carried along as a diagnostic payload and is never
//! interpreted by the gateway.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of an upstream outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
    /// No HTTP response was obtained
    Transport,
}

impl StatusClass {
    /// Classify an HTTP status code.
    ///
    /// Only 2xx counts as success. Unfollowed redirects and informational
    /// codes are treated as client errors since the gateway cannot act on
    /// them.
    pub const fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            500..=599 => Self::ServerError,
            _ => Self::ClientError,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Transport => "transport",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an authentication failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    /// No valid session token could be obtained
    Unavailable,
    /// The backend rejected a freshly refreshed token
    Rejected,
}

/// Fixed error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input rejected before any network call
    Validation,
    Auth(AuthFailure),
    /// Connection-level failure, no HTTP response
    Transport,
    Timeout,
    /// 4xx other than an auth rejection
    ClientError,
    /// 5xx
    ServerError,
    /// Batch item cut short by batch cancellation
    Cancelled,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Auth(AuthFailure::Unavailable) => "auth_unavailable",
            Self::Auth(AuthFailure::Rejected) => "auth_rejected",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::ClientError => "client_error",
            Self::ServerError => "server_error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of [`crate::GatewayRequest`] execution.
///
/// Reflects the last attempt only; `attempts` records how many were made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResult {
    pub status_class: StatusClass,
    pub status_code: Option<u16>,
    /// Raw upstream body, untouched
    pub body: Option<String>,
    /// Set for every non-success outcome
    pub error_kind: Option<ErrorKind>,
    /// Human readable failure description (transport error text, auth reason)
    pub message: Option<String>,
    pub attempts: u32,
    pub latency: Duration,
}

impl GatewayResult {
    /// Build a result from an HTTP response.
    ///
    /// The error kind is derived from the status; callers that know better
    /// (auth rejection) override it with [`Self::with_error_kind`].
    pub fn from_response(status: u16, body: String) -> Self {
        let status_class = StatusClass::from_status(status);
        let error_kind = match status_class {
            StatusClass::Success => None,
            StatusClass::ServerError => Some(ErrorKind::ServerError),
            StatusClass::ClientError | StatusClass::Transport => Some(ErrorKind::ClientError),
        };

        Self {
            status_class,
            status_code: Some(status),
            body: Some(body),
            error_kind,
            message: None,
            attempts: 1,
            latency: Duration::ZERO,
        }
    }

    /// Build a result for a call that produced no HTTP response
    pub fn no_response(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status_class: StatusClass::Transport,
            status_code: None,
            body: None,
            error_kind: Some(kind),
            message: Some(message.into()),
            attempts: 1,
            latency: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_error_kind(mut self, kind: ErrorKind, message: impl Into<String>) -> Self {
        self.error_kind = Some(kind);
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }

    /// Number of retries that happened after the first attempt
    pub const fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Convert into a `Result` for `?` propagation.
    ///
    /// A successful body is parsed as JSON when possible; an empty body
    /// yields `Value::Null` and a non-JSON body is returned as a string.
    ///
    /// # Errors
    ///
    /// Returns the classified [`GatewayError`] for every non-success outcome.
    pub fn into_result(self) -> Result<serde_json::Value, GatewayError> {
        match self.error_kind {
            None => Ok(parse_body(self.body.as_deref())),
            Some(kind) => {
                let message = self.message.unwrap_or_else(|| match self.status_code {
                    Some(code) => format!("upstream returned status {code}"),
                    None => "upstream call failed".to_string(),
                });
                Err(GatewayError {
                    kind,
                    message,
                    status_code: self.status_code,
                    detail: self.body,
                })
            }
        }
    }
}

fn parse_body(body: Option<&str>) -> serde_json::Value {
    match body.map(str::trim) {
        None | Some("") => serde_json::Value::Null,
        Some(raw) => serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string())),
    }
}

/// Classified failure of an upstream call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    /// Raw upstream body, if any
    pub detail: Option<String>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), status_code: None, detail: None }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}
