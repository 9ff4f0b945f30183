//! Session issuing over the Home Assistant REST API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument};

use super::issuer::{IssueError, SessionIssuer};
use crate::errors::InfraError;
use crate::http::HttpClient;

const SESSION_PATH: &str = "/api/hassio/ingress/session";

/// Issues ingress sessions with `POST /api/hassio/ingress/session`
pub struct IngressHttpIssuer {
    http: HttpClient,
    endpoint: String,
    access_token: String,
    timeout: Duration,
}

impl IngressHttpIssuer {
    /// # Errors
    /// Returns `InfraError::Config` if the HTTP client cannot be built.
    pub fn new(
        host_url: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InfraError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}{SESSION_PATH}", host_url.trim_end_matches('/')),
            access_token: access_token.into(),
            timeout,
        })
    }
}

#[async_trait]
impl SessionIssuer for IngressHttpIssuer {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn issue(&self) -> Result<String, IssueError> {
        debug!("Requesting ingress session over REST");

        let request =
            self.http.request(Method::POST, &self.endpoint).bearer_auth(&self.access_token);

        let response = self.http.fetch(request).await.map_err(|err| match err {
            InfraError::Timeout(_) => IssueError::Timeout(self.timeout),
            other => IssueError::Connect(other.to_string()),
        })?;

        match response.status {
            200..=299 => {}
            401 | 403 => return Err(IssueError::Rejected(format!("status {}", response.status))),
            status => {
                return Err(IssueError::Protocol(format!("status {status}: {}", response.body)));
            }
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| IssueError::Protocol(format!("invalid JSON: {e}")))?;

        payload
            .pointer("/data/session")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| IssueError::Protocol("response carries no session".to_string()))
    }
}
