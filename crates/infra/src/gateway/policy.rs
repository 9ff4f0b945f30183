//! Retry classification for upstream calls
//!
//! | failure              | idempotent | non-idempotent |
//! |----------------------|------------|----------------|
//! | transport, not sent  | retry      | retry          |
//! | transport, sent      | retry      | stop           |
//! | timeout              | retry      | stop           |
//! | 5xx                  | retry      | stop           |
//! | 4xx / auth           | stop       | stop           |
//! | malformed request    | stop       | stop           |

use grocy_common::resilience::{RetryDecision, RetryPolicy};
use grocy_domain::GatewayResult;

use crate::errors::{InfraError, SendPhase};

/// What went wrong in a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    TransportBeforeSend,
    TransportAfterSend,
    Timeout,
    ServerError,
    ClientError,
    Auth,
    InvalidRequest,
}

impl FailureKind {
    /// Classify a transport-level failure
    pub fn from_infra(err: &InfraError) -> Self {
        match err {
            InfraError::Transport { phase: SendPhase::BeforeSend, .. } => Self::TransportBeforeSend,
            InfraError::Transport { phase: SendPhase::AfterSend, .. } => Self::TransportAfterSend,
            InfraError::Timeout(_) => Self::Timeout,
            InfraError::InvalidRequest(_) | InfraError::Config(_) => Self::InvalidRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    NonIdempotent,
}

impl From<bool> for Idempotency {
    fn from(idempotent: bool) -> Self {
        if idempotent {
            Self::Idempotent
        } else {
            Self::NonIdempotent
        }
    }
}

/// Whether a failure of `kind` may be retried
pub const fn retry_allowed(kind: FailureKind, idempotency: Idempotency) -> bool {
    match kind {
        FailureKind::TransportBeforeSend => true,
        FailureKind::TransportAfterSend | FailureKind::Timeout | FailureKind::ServerError => {
            matches!(idempotency, Idempotency::Idempotent)
        }
        FailureKind::ClientError | FailureKind::Auth | FailureKind::InvalidRequest => false,
    }
}

/// A failed attempt: the result to report if it is the last one, plus its
/// classification
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub result: GatewayResult,
    pub failure: FailureKind,
}

/// [`RetryPolicy`] applying the table above for one request
#[derive(Debug, Clone, Copy)]
pub struct RequestRetryPolicy {
    idempotency: Idempotency,
}

impl RequestRetryPolicy {
    pub const fn new(idempotency: Idempotency) -> Self {
        Self { idempotency }
    }
}

impl RetryPolicy<AttemptFailure> for RequestRetryPolicy {
    fn should_retry(&self, error: &AttemptFailure, _attempt: u32) -> RetryDecision {
        if retry_allowed(error.failure, self.idempotency) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}
