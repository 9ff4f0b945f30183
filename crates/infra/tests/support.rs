//! Shared fixtures for gateway integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grocy_common::resilience::RetryConfig;
use grocy_infra::gateway::{Gateway, GatewaySettings};
use grocy_infra::session::{IssueError, SessionIssuer, SessionSettings, SessionTokenManager};
use parking_lot::Mutex;

pub const API_KEY: &str = "test-api-key";
pub const API_KEY_HEADER: &str = "GROCY-API-KEY";
pub const SESSION_COOKIE: &str = "ingress_session";

/// Issuer that replays a script of outcomes, then falls back to
/// `session-N` values (N = call number) once the script runs out.
pub struct ScriptedIssuer {
    script: Mutex<VecDeque<Result<String, IssueError>>>,
    fallback_ok: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedIssuer {
    /// Always succeeds with `session-1`, `session-2`, ...
    pub fn healthy() -> Arc<Self> {
        Self::build(Vec::new(), true, Duration::ZERO)
    }

    /// Always fails with a transient connect error
    pub fn unreachable() -> Arc<Self> {
        Self::build(Vec::new(), false, Duration::ZERO)
    }

    /// Healthy issuer that takes `delay` per call
    pub fn slow(delay: Duration) -> Arc<Self> {
        Self::build(Vec::new(), true, delay)
    }

    /// Replays `script`; afterwards succeeds if `then_ok`, else fails
    pub fn scripted(script: Vec<Result<String, IssueError>>, then_ok: bool) -> Arc<Self> {
        Self::build(script, then_ok, Duration::ZERO)
    }

    fn build(
        script: Vec<Result<String, IssueError>>,
        fallback_ok: bool,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback_ok,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionIssuer for ScriptedIssuer {
    async fn issue(&self) -> Result<String, IssueError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        if self.fallback_ok {
            Ok(format!("session-{call}"))
        } else {
            Err(IssueError::Connect("host unreachable".to_string()))
        }
    }
}

/// Retry settings with short fixed delays and no jitter
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(max_attempts)
        .fixed_backoff(Duration::from_millis(10))
        .no_jitter()
        .build()
        .expect("valid retry config")
}

/// Token manager with a 60s TTL and a single issue attempt per refresh
pub fn manager(issuer: Arc<dyn SessionIssuer>) -> SessionTokenManager {
    manager_with_attempts(issuer, 1)
}

pub fn manager_with_attempts(issuer: Arc<dyn SessionIssuer>, attempts: u32) -> SessionTokenManager {
    SessionTokenManager::new(
        issuer,
        SessionSettings {
            ttl: Duration::from_secs(60),
            issue_timeout: Duration::from_secs(5),
            retry: fast_retry(attempts),
        },
    )
}

/// Gateway against `base_url` sending the session as a cookie
pub fn gateway(base_url: &str, sessions: SessionTokenManager) -> Gateway {
    gateway_with(base_url, sessions, Duration::from_secs(5), 3)
}

pub fn gateway_with(
    base_url: &str,
    sessions: SessionTokenManager,
    request_timeout: Duration,
    max_attempts: u32,
) -> Gateway {
    let settings = GatewaySettings {
        base_url: base_url.to_string(),
        api_key_header: API_KEY_HEADER.to_string(),
        api_key: API_KEY.to_string(),
        session_cookie: Some(SESSION_COOKIE.to_string()),
        request_timeout,
        retry: fast_retry(max_attempts),
    };
    Gateway::new(settings, Arc::new(sessions)).expect("gateway should build")
}

/// Cookie header value carrying `session`
pub fn session_cookie(session: &str) -> String {
    format!("{SESSION_COOKIE}={session}")
}

/// Base URL on a local port nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/api")
}
