//! Conversions from external infrastructure errors into gateway errors.

use grocy_domain::DomainError;
use reqwest::Error as HttpError;

use super::InfraError;

/* -------------------------------------------------------------------------- */
/* reqwest::Error → InfraError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let message = err.to_string();

        if err.is_builder() {
            return Self::InvalidRequest(message);
        }
        // A connect timeout is still a connect failure: nothing reached the
        // backend, so it is checked before the generic timeout.
        if err.is_connect() {
            return Self::before_send(message);
        }
        if err.is_timeout() {
            return Self::Timeout(message);
        }
        Self::after_send(message)
    }
}

/* -------------------------------------------------------------------------- */
/* InfraError → DomainError */
/* -------------------------------------------------------------------------- */

impl From<InfraError> for DomainError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Config(message) => Self::Config(message),
            InfraError::InvalidRequest(message) => Self::InvalidInput(message),
            other => Self::Internal(other.to_string()),
        }
    }
}
