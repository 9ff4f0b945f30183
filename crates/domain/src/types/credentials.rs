//! Long-lived upstream credentials
//!
//! Loaded once at startup and never mutated. Both secrets are redacted from
//! `Debug` output so credentials can be logged as part of larger structures.

use std::fmt;

use serde::{Deserialize, Serialize};

const REDACTED: &str = "[REDACTED]";

/// Where session tokens are issued from.
///
/// `host_url` is the Home Assistant instance that fronts the backend and
/// `access_token` is the long-lived host token used to open a session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokenSource {
    pub host_url: String,
    pub access_token: String,
}

impl fmt::Debug for AuthTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokenSource")
            .field("host_url", &self.host_url)
            .field("access_token", &REDACTED)
            .finish()
    }
}

/// Credentials for the upstream inventory API
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Base URL of the backend REST API, e.g. `http://host:9192/api`
    pub backend_base_url: String,
    /// Static API key sent on every call
    pub api_key: String,
    pub auth_token_source: AuthTokenSource,
}

impl Credentials {
    pub fn new(
        backend_base_url: impl Into<String>,
        api_key: impl Into<String>,
        auth_token_source: AuthTokenSource,
    ) -> Self {
        Self {
            backend_base_url: backend_base_url.into(),
            api_key: api_key.into(),
            auth_token_source,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("backend_base_url", &self.backend_base_url)
            .field("api_key", &REDACTED)
            .field("auth_token_source", &self.auth_token_source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::new(
            "http://grocy.local/api",
            "super-secret-key",
            AuthTokenSource {
                host_url: "http://ha.local:8123".to_string(),
                access_token: "long-lived-host-token".to_string(),
            },
        );

        let rendered = format!("{creds:?}");
        assert!(rendered.contains("http://grocy.local/api"));
        assert!(rendered.contains("http://ha.local:8123"));
        assert!(!rendered.contains("super-secret-key"));
        assert!(!rendered.contains("long-lived-host-token"));
        assert!(rendered.contains(REDACTED));
    }
}
