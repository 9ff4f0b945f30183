//! Session token manager with coalesced refresh
//!
//! Manages the ingress session lifecycle:
//! - The current token is published as an immutable `Arc` snapshot through a
//!   `tokio::sync::watch` channel; readers never take a lock held across I/O
//! - At most one refresh runs at a time; concurrent requesters share its
//!   result
//! - The refresh runs on its own task, so a requester that gets cancelled
//!   does not cancel the refresh for everyone else
//! - A failed refresh leaves the previous token in place until it expires

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use grocy_common::resilience::policies::PredicateRetry;
use grocy_common::resilience::{RetryConfig, RetryExecutor};
use grocy_domain::{AuthFailure, ErrorKind, GatewayError};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::issuer::{IssueError, SessionIssuer};
use super::token::SessionToken;

type RefreshResult = Result<Arc<SessionToken>, IssueError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// Settings for the token manager
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Lifetime of an issued session
    pub ttl: Duration,
    /// Per-attempt bound on the issuer call
    pub issue_timeout: Duration,
    /// Attempt budget and backoff for one refresh
    pub retry: RetryConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            issue_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

/// Owner of the single current session token
#[derive(Clone)]
pub struct SessionTokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    issuer: Arc<dyn SessionIssuer>,
    settings: SessionSettings,
    current: watch::Sender<Option<Arc<SessionToken>>>,
    in_flight: Mutex<Option<SharedRefresh>>,
    generation: AtomicU64,
    refreshes: AtomicU64,
}

impl SessionTokenManager {
    pub fn new(issuer: Arc<dyn SessionIssuer>, settings: SessionSettings) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                issuer,
                settings,
                current,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Latest token, valid or not
    pub fn current(&self) -> Option<Arc<SessionToken>> {
        self.inner.current.borrow().clone()
    }

    /// Latest token if it is still within its TTL
    pub fn current_valid(&self) -> Option<Arc<SessionToken>> {
        self.current().filter(|token| token.is_valid())
    }

    /// Observe token replacements
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SessionToken>>> {
        self.inner.current.subscribe()
    }

    /// Number of refresh executions so far (coalesced waiters count once)
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    /// Return a valid token, refreshing only when none exists.
    ///
    /// A still-valid token is returned immediately even while a refresh is
    /// in flight.
    ///
    /// # Errors
    /// Returns `Auth(Unavailable)` if no valid token exists and the refresh
    /// failed after its retry budget.
    pub async fn get_token(&self) -> Result<Arc<SessionToken>, GatewayError> {
        if let Some(token) = self.current_valid() {
            return Ok(token);
        }

        debug!("No valid session token, waiting for refresh");
        self.await_refresh().await
    }

    /// Refresh after the backend rejected `stale`.
    ///
    /// If a newer token has already been published it is returned without
    /// another refresh; otherwise this joins (or starts) the coalesced
    /// refresh.
    ///
    /// # Errors
    /// Returns `Auth(Unavailable)` if the refresh failed.
    pub async fn refresh_after_rejection(
        &self,
        stale: &SessionToken,
    ) -> Result<Arc<SessionToken>, GatewayError> {
        if let Some(token) = self.current_valid() {
            if token.generation() > stale.generation() {
                debug!(generation = token.generation(), "Newer session token already available");
                return Ok(token);
            }
        }

        self.await_refresh().await
    }

    /// Run (or join) a refresh regardless of the current token's validity.
    ///
    /// Used by the periodic refresher.
    ///
    /// # Errors
    /// Returns the last [`IssueError`] of the failed refresh.
    pub async fn refresh(&self) -> Result<Arc<SessionToken>, IssueError> {
        self.shared_refresh().await
    }

    async fn await_refresh(&self) -> Result<Arc<SessionToken>, GatewayError> {
        match self.shared_refresh().await {
            Ok(token) if token.is_valid() => Ok(token),
            Ok(_) => Err(unavailable("issued session token is already expired")),
            Err(err) => Err(unavailable(&err.to_string())),
        }
    }

    fn shared_refresh(&self) -> SharedRefresh {
        let mut slot = self.inner.in_flight.lock();
        if let Some(refresh) = slot.as_ref() {
            return refresh.clone();
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let result = inner.run_refresh().await;
            // Publish happened inside run_refresh; later callers see the new
            // token before they can find the slot empty.
            inner.in_flight.lock().take();
            result
        });

        let refresh = async move {
            handle.await.unwrap_or_else(|join_err| Err(IssueError::Interrupted(join_err.to_string())))
        }
        .boxed()
        .shared();

        *slot = Some(refresh.clone());
        refresh
    }
}

impl Inner {
    #[instrument(skip(self), fields(ttl_secs = self.settings.ttl.as_secs()))]
    async fn run_refresh(&self) -> RefreshResult {
        self.refreshes.fetch_add(1, Ordering::SeqCst);

        let policy = PredicateRetry::new(|err: &IssueError, _attempt: u32| err.is_transient());
        let executor = RetryExecutor::new(self.settings.retry.clone(), policy);
        let timeout = self.settings.issue_timeout;

        let outcome = executor
            .execute_notify(
                || async move {
                    tokio::time::timeout(timeout, self.issuer.issue())
                        .await
                        .map_err(|_| IssueError::Timeout(timeout))?
                },
                |err, attempt, delay| {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Session issue failed, retrying");
                },
            )
            .await;

        let attempts = outcome.attempts;
        match outcome.into_result() {
            Ok(value) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let token =
                    Arc::new(SessionToken::new(value, Instant::now(), self.settings.ttl, generation));
                self.current.send_replace(Some(Arc::clone(&token)));
                info!(generation, attempts, "session_refreshed");
                Ok(token)
            }
            Err(err) => {
                let last = err
                    .into_last_error()
                    .unwrap_or_else(|| IssueError::Interrupted("invalid retry configuration".into()));
                let still_valid = self.current.borrow().as_ref().is_some_and(|t| t.is_valid());
                warn!(attempts, error = %last, previous_token_valid = still_valid, "session_refresh_failed");
                Err(last)
            }
        }
    }
}

fn unavailable(message: &str) -> GatewayError {
    GatewayError::new(
        ErrorKind::Auth(AuthFailure::Unavailable),
        format!("no valid session token: {message}"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;

    /// Issuer returning `session-N`, optionally slow, optionally failing
    struct CountingIssuer {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingIssuer {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), delay, fail })
        }
    }

    #[async_trait]
    impl SessionIssuer for CountingIssuer {
        async fn issue(&self) -> Result<String, IssueError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(IssueError::Connect("host unreachable".into()))
            } else {
                Ok(format!("session-{n}"))
            }
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            ttl: Duration::from_secs(60),
            issue_timeout: Duration::from_secs(5),
            retry: RetryConfig::builder()
                .max_attempts(3)
                .fixed_backoff(Duration::from_millis(100))
                .no_jitter()
                .build()
                .unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_issues_token() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let token = manager.get_token().await.unwrap();
        assert_eq!(token.value(), "session-1");
        assert_eq!(token.generation(), 1);
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_token_is_reused() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let first = manager.get_token().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = manager.get_token().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_rejection_skips_when_newer_exists() {
        let issuer = CountingIssuer::new(Duration::ZERO, false);
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let stale = manager.get_token().await.unwrap();
        let fresh = manager.refresh_after_rejection(&stale).await.unwrap();
        assert_eq!(fresh.generation(), 2);

        // A second caller rejected with the same stale token gets the fresh one
        let again = manager.refresh_after_rejection(&stale).await.unwrap();
        assert!(Arc::ptr_eq(&fresh, &again));
        assert_eq!(manager.refresh_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credential_is_not_retried() {
        struct Rejecting(AtomicUsize);

        #[async_trait]
        impl SessionIssuer for Rejecting {
            async fn issue(&self) -> Result<String, IssueError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(IssueError::Rejected("auth_invalid".into()))
            }
        }

        let issuer = Arc::new(Rejecting(AtomicUsize::new(0)));
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let err = manager.get_token().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth(AuthFailure::Unavailable));
        assert_eq!(issuer.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_uses_retry_budget() {
        let issuer = CountingIssuer::new(Duration::ZERO, true);
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let err = manager.get_token().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth(AuthFailure::Unavailable));
        assert!(err.message.contains("host unreachable"));
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 3);
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_issuer_times_out() {
        let issuer = CountingIssuer::new(Duration::from_secs(30), false);
        let manager = SessionTokenManager::new(issuer, settings());

        let err = manager.refresh().await.unwrap_err();
        assert_eq!(err, IssueError::Timeout(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_requester_does_not_cancel_refresh() {
        let issuer = CountingIssuer::new(Duration::from_secs(1), false);
        let manager = SessionTokenManager::new(issuer.clone(), settings());

        let impatient = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_token().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        impatient.abort();

        let token = manager.get_token().await.unwrap();
        assert_eq!(token.value(), "session-1");
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 1);
    }
}
