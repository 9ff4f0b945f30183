//! Authenticated upstream gateway
//!
//! Every upstream call goes through [`Gateway::execute`], which:
//! 1. attaches the API key and the current ingress session
//! 2. sends the request with a per-attempt timeout
//! 3. on `401` refreshes the session and resends exactly once
//! 4. retries according to [`super::policy`] with exponential backoff
//!
//! The caller always receives a [`GatewayResult`]; nothing is thrown.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grocy_common::resilience::{RetryConfig, RetryExecutor};
use grocy_domain::{
    AuthFailure, ErrorKind, GatewayConfig, GatewayRequest, GatewayResult, Method,
};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::auth::TokenSource;
use super::policy::{AttemptFailure, FailureKind, RequestRetryPolicy};
use crate::credentials::CredentialStore;
use crate::errors::InfraError;
use crate::http::{HttpClient, RawResponse};
use crate::session::SessionToken;

/// Executes a single upstream request to completion
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &GatewayRequest) -> GatewayResult;
}

/// How requests are authenticated and bounded
#[derive(Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key_header: String,
    pub api_key: String,
    /// Cookie name carrying the session; `None` sends it as a bearer token
    pub session_cookie: Option<String>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl GatewaySettings {
    /// # Errors
    /// Returns `InfraError::Config` if the retry settings are inconsistent.
    pub fn from_config(config: &GatewayConfig, credentials: &CredentialStore) -> Result<Self, InfraError> {
        let retry = RetryConfig::builder()
            .max_attempts(config.retry.max_attempts)
            .exponential_backoff(config.retry.base_delay(), 2.0, config.retry.max_delay())
            .equal_jitter()
            .build()
            .map_err(|e| InfraError::Config(e.to_string()))?;

        let cookie = config.backend.session_cookie.trim();
        Ok(Self {
            base_url: credentials.backend_base_url().to_string(),
            api_key_header: config.backend.api_key_header.clone(),
            api_key: credentials.api_key().to_string(),
            session_cookie: (!cookie.is_empty()).then(|| cookie.to_string()),
            request_timeout: config.request.timeout(),
            retry,
        })
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("base_url", &self.base_url)
            .field("api_key_header", &self.api_key_header)
            .field("api_key", &"[REDACTED]")
            .field("session_cookie", &self.session_cookie)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Single entry point for upstream calls
#[derive(Clone)]
pub struct Gateway {
    http: HttpClient,
    tokens: Arc<dyn TokenSource>,
    settings: Arc<GatewaySettings>,
}

impl Gateway {
    /// # Errors
    /// Returns `InfraError::Config` if the HTTP client cannot be built.
    pub fn new(settings: GatewaySettings, tokens: Arc<dyn TokenSource>) -> Result<Self, InfraError> {
        let http = HttpClient::builder().timeout(settings.request_timeout).build()?;
        Ok(Self { http, tokens, settings: Arc::new(settings) })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Execute `request` with authentication, timeout and retries.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: &GatewayRequest) -> GatewayResult {
        let started = Instant::now();
        let policy = RequestRetryPolicy::new(request.is_idempotent().into());
        let executor = RetryExecutor::new(self.settings.retry.clone(), policy);

        let outcome = executor
            .execute_notify(
                || self.attempt(request),
                |failure, attempt, delay| {
                    info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        failure = ?failure.failure,
                        status = failure.result.status_code,
                        "upstream_retry"
                    );
                },
            )
            .await;

        let attempts = outcome.attempts;
        let result = match outcome.result {
            Ok(result) => result,
            Err(err) => err.into_last_error().map_or_else(
                || GatewayResult::no_response(ErrorKind::Transport, "invalid retry configuration"),
                |failure| failure.result,
            ),
        };

        let result = result.with_attempts(attempts).with_latency(started.elapsed());
        if !result.is_success() {
            warn!(
                attempts,
                error_kind = ?result.error_kind,
                status = result.status_code,
                "upstream_failed"
            );
        }
        result
    }

    /// One attempt, including the single resend after a session rejection
    async fn attempt(&self, request: &GatewayRequest) -> Result<GatewayResult, AttemptFailure> {
        let token = self.tokens.token().await.map_err(auth_unavailable)?;

        let first = self.send_once(request, &token).await;
        if !is_unauthorized(&first) {
            return classify(first);
        }

        debug!(generation = token.generation(), "Session rejected, refreshing");
        let refreshed = self.tokens.refresh_after_rejection(&token).await.map_err(auth_unavailable)?;

        let second = self.send_once(request, &refreshed).await;
        if let Ok(raw) = &second {
            if raw.status == 401 {
                let result = GatewayResult::from_response(raw.status, raw.body.clone()).with_error_kind(
                    ErrorKind::Auth(AuthFailure::Rejected),
                    "backend rejected a freshly issued session",
                );
                return Err(AttemptFailure { result, failure: FailureKind::Auth });
            }
        }
        classify(second)
    }

    async fn send_once(
        &self,
        request: &GatewayRequest,
        token: &SessionToken,
    ) -> Result<RawResponse, InfraError> {
        let started = Instant::now();
        let url = join_url(&self.settings.base_url, &request.path);

        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), url.as_str())
            .header(self.settings.api_key_header.as_str(), self.settings.api_key.as_str())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");

        builder = match &self.settings.session_cookie {
            Some(name) => builder.header(COOKIE, format!("{name}={}", token.value())),
            None => builder.bearer_auth(token.value()),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout = self.settings.request_timeout;
        let response = match tokio::time::timeout(timeout, self.http.fetch(builder)).await {
            Ok(response) => response,
            Err(_) => Err(InfraError::Timeout(format!("no response within {timeout:?}"))),
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        match &response {
            Ok(raw) => info!(
                method = %request.method,
                path = %request.path,
                status = raw.status,
                status_class = %grocy_domain::StatusClass::from_status(raw.status),
                latency_ms,
                "upstream_attempt"
            ),
            Err(err) => info!(
                method = %request.method,
                path = %request.path,
                status_class = "transport",
                error = %err,
                latency_ms,
                "upstream_attempt"
            ),
        }
        response
    }
}

#[async_trait]
impl RequestExecutor for Gateway {
    async fn execute(&self, request: &GatewayRequest) -> GatewayResult {
        Gateway::execute(self, request).await
    }
}

fn is_unauthorized(response: &Result<RawResponse, InfraError>) -> bool {
    matches!(response, Ok(raw) if raw.status == 401)
}

fn auth_unavailable(err: grocy_domain::GatewayError) -> AttemptFailure {
    AttemptFailure {
        result: GatewayResult::no_response(ErrorKind::Auth(AuthFailure::Unavailable), err.message),
        failure: FailureKind::Auth,
    }
}

/// Map one send into success or a classified failure
fn classify(response: Result<RawResponse, InfraError>) -> Result<GatewayResult, AttemptFailure> {
    match response {
        Ok(raw) => {
            let result = GatewayResult::from_response(raw.status, raw.body);
            match raw.status {
                200..=299 => Ok(result),
                500..=599 => Err(AttemptFailure { result, failure: FailureKind::ServerError }),
                _ => Err(AttemptFailure { result, failure: FailureKind::ClientError }),
            }
        }
        Err(err) => {
            let failure = FailureKind::from_infra(&err);
            let kind = match failure {
                FailureKind::Timeout => ErrorKind::Timeout,
                FailureKind::InvalidRequest => ErrorKind::Validation,
                _ => ErrorKind::Transport,
            };
            Err(AttemptFailure { result: GatewayResult::no_response(kind, err.to_string()), failure })
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

const fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}
