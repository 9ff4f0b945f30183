//! Configuration management
//!
//! Every section and field has a serde default except the two secrets
//! (`backend.api_key`, `host.access_token`), which may also be supplied
//! through the environment by the loader in `grocy-infra`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_KEY_HEADER, DEFAULT_BACKEND_URL, DEFAULT_BASE_DELAY_MS,
    DEFAULT_BATCH_CONCURRENCY, DEFAULT_ISSUE_TIMEOUT_SECS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_ISSUE_ATTEMPTS, DEFAULT_MAX_REFRESH_BACKOFF_SECS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SESSION_COOKIE,
    DEFAULT_SESSION_TTL_SECS, INGRESS_PATH_MARKER,
};
use crate::errors::{DomainError, Result};
use crate::types::{AuthTokenSource, Credentials};

/// Gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub backend: BackendConfig,
    pub host: HostConfig,
    pub session: SessionConfig,
    pub retry: RetryConfig,
    pub request: RequestConfig,
    pub batch: BatchConfig,
}

/// Upstream REST API
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub api_key_header: String,
    /// Cookie name carrying the session token. Empty means the token is
    /// sent as `Authorization: Bearer` instead.
    pub session_cookie: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            api_key: String::new(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_key_header", &self.api_key_header)
            .field("session_cookie", &self.session_cookie)
            .finish()
    }
}

/// Session issuing channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerKind {
    /// Home Assistant websocket `supervisor/api` call
    #[default]
    Websocket,
    /// Home Assistant REST `hassio/ingress/session` call
    Http,
}

/// Home Assistant host that issues ingress sessions
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Derived from `backend.base_url` when absent
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub issuer: IssuerKind,
}

impl std::fmt::Debug for HostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostConfig")
            .field("url", &self.url)
            .field("access_token", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub refresh_interval_secs: u64,
    pub issue_timeout_secs: u64,
    /// Attempts per on-demand refresh before reporting the token unavailable
    pub max_issue_attempts: u32,
    /// Cap on the background refresher's backoff after failures
    pub max_backoff_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            issue_timeout_secs: DEFAULT_ISSUE_TIMEOUT_SECS,
            max_issue_attempts: DEFAULT_MAX_ISSUE_ATTEMPTS,
            max_backoff_secs: DEFAULT_MAX_REFRESH_BACKOFF_SECS,
        }
    }
}

impl SessionConfig {
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub const fn issue_timeout(&self) -> Duration {
        Duration::from_secs(self.issue_timeout_secs)
    }

    pub const fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

/// Request retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub const fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub timeout_secs: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS }
    }
}

impl RequestConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: DEFAULT_BATCH_CONCURRENCY }
    }
}

impl GatewayConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if a secret is missing, a URL does not
    /// parse, the refresh interval is not shorter than the TTL, or a budget
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.backend.api_key.trim().is_empty() {
            return Err(DomainError::Config("backend.api_key is required".to_string()));
        }
        if self.host.access_token.trim().is_empty() {
            return Err(DomainError::Config("host.access_token is required".to_string()));
        }
        if self.backend.api_key_header.trim().is_empty() {
            return Err(DomainError::Config("backend.api_key_header must not be empty".to_string()));
        }

        parse_http_url("backend.base_url", &self.backend.base_url)?;
        if let Some(host) = &self.host.url {
            parse_http_url("host.url", host)?;
        }

        if self.session.ttl_secs == 0 {
            return Err(DomainError::Config("session.ttl_secs must be positive".to_string()));
        }
        if self.session.refresh_interval_secs == 0
            || self.session.refresh_interval_secs >= self.session.ttl_secs
        {
            return Err(DomainError::Config(format!(
                "session.refresh_interval_secs ({}) must be positive and shorter than session.ttl_secs ({})",
                self.session.refresh_interval_secs, self.session.ttl_secs
            )));
        }
        if self.session.max_issue_attempts == 0 {
            return Err(DomainError::Config("session.max_issue_attempts must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(DomainError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        if self.request.timeout_secs == 0 {
            return Err(DomainError::Config("request.timeout_secs must be positive".to_string()));
        }
        if self.batch.max_concurrency == 0 {
            return Err(DomainError::Config("batch.max_concurrency must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Home Assistant host URL, explicit or derived from the backend URL.
    ///
    /// Derivation keeps everything before the ingress path marker; a backend
    /// URL without the marker yields its origin.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if the backend URL does not parse.
    pub fn host_url(&self) -> Result<String> {
        if let Some(url) = &self.host.url {
            return Ok(url.trim_end_matches('/').to_string());
        }

        let base = self.backend.base_url.as_str();
        if let Some(pos) = base.find(INGRESS_PATH_MARKER) {
            return Ok(base[..pos].trim_end_matches('/').to_string());
        }

        let parsed = parse_http_url("backend.base_url", base)?;
        Ok(parsed.origin().ascii_serialization())
    }

    /// Credentials assembled from the backend and host sections
    ///
    /// # Errors
    /// Propagates [`Self::host_url`] failures.
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials::new(
            self.backend.base_url.clone(),
            self.backend.api_key.clone(),
            AuthTokenSource {
                host_url: self.host_url()?,
                access_token: self.host.access_token.clone(),
            },
        ))
    }
}

fn parse_http_url(field: &str, raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| DomainError::Config(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(DomainError::Config(format!("{field} must use http or https, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.backend.api_key = "key".to_string();
        config.host.access_token = "token".to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.backend.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(config.backend.api_key_header, "GROCY-API-KEY");
        assert_eq!(config.backend.session_cookie, "ingress_session");
        assert_eq!(config.host.issuer, IssuerKind::Websocket);
        assert_eq!(config.session.ttl(), Duration::from_secs(60));
        assert_eq!(config.session.refresh_interval(), Duration::from_secs(55));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.request.timeout(), Duration::from_secs(30));
        assert_eq!(config.batch.max_concurrency, 4);
    }

    #[test]
    fn test_validate_accepts_defaults_with_secrets() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_secrets() {
        let mut config = valid_config();
        config.backend.api_key.clear();
        assert!(matches!(config.validate(), Err(DomainError::Config(_))));

        let mut config = valid_config();
        config.host.access_token = "   ".to_string();
        assert!(matches!(config.validate(), Err(DomainError::Config(_))));
    }

    #[test]
    fn test_validate_refresh_must_precede_expiry() {
        let mut config = valid_config();
        config.session.refresh_interval_secs = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_budgets() {
        let mut config = valid_config();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.batch.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = valid_config();
        config.backend.base_url = "ftp://grocy.local/api".to_string();
        assert!(config.validate().is_err());

        config.backend.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_host_url_derived_from_ingress_path() {
        let mut config = valid_config();
        config.backend.base_url =
            "https://ha.example.com/api/hassio_ingress/abc123/api".to_string();
        assert_eq!(config.host_url().unwrap(), "https://ha.example.com");
    }

    #[test]
    fn test_host_url_defaults_to_origin() {
        let config = valid_config();
        assert_eq!(config.host_url().unwrap(), "http://homeassistant.local:9192");
    }

    #[test]
    fn test_host_url_explicit_wins() {
        let mut config = valid_config();
        config.host.url = Some("http://ha.local:8123/".to_string());
        assert_eq!(config.host_url().unwrap(), "http://ha.local:8123");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = valid_config();
        config.backend.api_key = "grocy-secret".to_string();
        config.host.access_token = "ha-secret".to_string();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("grocy-secret"));
        assert!(!rendered.contains("ha-secret"));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: GatewayConfig = parse_json(r#"{"batch": {"max_concurrency": 8}}"#);
        assert_eq!(config.batch.max_concurrency, 8);
        assert_eq!(config.session.ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    fn parse_json(raw: &str) -> GatewayConfig {
        serde_json::from_str(raw).unwrap()
    }
}
