//! Credential store
//!
//! Holds the long-lived upstream credentials for the lifetime of the
//! process. Built once from configuration, then shared read-only.

use std::sync::Arc;

use grocy_domain::{Credentials, GatewayConfig, Result};

/// Read-only holder of [`Credentials`]
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials: Arc<Credentials>,
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials: Arc::new(credentials) }
    }

    /// Build the store from a validated configuration.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if the host URL cannot be derived.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Ok(Self::new(config.credentials()?))
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn backend_base_url(&self) -> &str {
        &self.credentials.backend_base_url
    }

    pub fn api_key(&self) -> &str {
        &self.credentials.api_key
    }

    pub fn host_url(&self) -> &str {
        &self.credentials.auth_token_source.host_url
    }

    pub fn host_access_token(&self) -> &str {
        &self.credentials.auth_token_source.access_token
    }
}
