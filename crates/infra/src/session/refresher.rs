//! Periodic session refresher
//!
//! Keeps the session fresh ahead of expiry so request paths rarely have to
//! wait on the issuer. Refreshes run through the token manager, so they
//! coalesce with on-demand refreshes triggered by requests.
//!
//! Failures never stop the loop; it backs off exponentially (capped at the
//! refresh interval) and keeps trying until stopped.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::manager::SessionTokenManager;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RefresherError {
    #[error("Refresher already running")]
    AlreadyRunning,

    #[error("Refresher not running")]
    NotRunning,

    #[error("Refresher did not stop within {0:?}")]
    Timeout(Duration),

    #[error("Refresher task failed: {0}")]
    TaskJoinFailed(String),
}

/// Refresher timing
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Age at which a token is replaced
    pub interval: Duration,
    /// Upper bound on the wait between failed refreshes
    pub max_backoff: Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(55), max_backoff: Duration::from_secs(30) }
    }
}

/// Background task that refreshes the session every `interval`
pub struct TokenRefresher {
    manager: SessionTokenManager,
    config: RefresherConfig,
    cancellation: CancellationToken,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TokenRefresher {
    pub fn new(manager: SessionTokenManager, config: RefresherConfig) -> Self {
        Self {
            manager,
            config,
            cancellation: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the refresh loop.
    ///
    /// If no token exists yet, the first refresh starts immediately.
    ///
    /// # Errors
    /// Returns [`RefresherError::AlreadyRunning`] if the loop is active.
    #[instrument(skip(self), fields(interval_secs = self.config.interval.as_secs()))]
    pub async fn start(&mut self) -> Result<(), RefresherError> {
        if self.is_running() {
            return Err(RefresherError::AlreadyRunning);
        }

        // Fresh token so the refresher can be restarted after stop
        self.cancellation = CancellationToken::new();

        let manager = self.manager.clone();
        let config = self.config.clone();
        let cancel = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            Self::refresh_loop(manager, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);
        info!("Token refresher started");
        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// # Errors
    /// Returns [`RefresherError::NotRunning`] if the loop is not active, or a
    /// timeout/join error if it does not wind down cleanly.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), RefresherError> {
        if !self.is_running() {
            return Err(RefresherError::NotRunning);
        }

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(STOP_TIMEOUT, handle)
                .await
                .map_err(|_| RefresherError::Timeout(STOP_TIMEOUT))?
                .map_err(|e| RefresherError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Token refresher stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn refresh_loop(
        manager: SessionTokenManager,
        config: RefresherConfig,
        cancel: CancellationToken,
    ) {
        let mut failures: u32 = 0;

        loop {
            let wait = next_wait(&manager, &config, failures);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("Refresh loop cancelled");
                    break;
                }
                () = tokio::time::sleep(wait) => {}
            }

            // A request path may have refreshed while we slept
            if let Some(token) = manager.current() {
                if Instant::now() < token.issued_at() + config.interval {
                    failures = 0;
                    continue;
                }
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = manager.refresh() => result,
            };

            match result {
                Ok(token) => {
                    failures = 0;
                    debug!(generation = token.generation(), "Scheduled refresh succeeded");
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    warn!(failures, error = %err, "Scheduled refresh failed, backing off");
                }
            }
        }
    }
}

impl Drop for TokenRefresher {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Time until the next refresh attempt.
///
/// After failures this is an exponential backoff starting at one second,
/// capped at `min(max_backoff, interval)`. Otherwise it is the moment the
/// current token reaches `interval` age, or zero when there is no token.
fn next_wait(manager: &SessionTokenManager, config: &RefresherConfig, failures: u32) -> Duration {
    if failures > 0 {
        let cap = config.max_backoff.min(config.interval);
        let exponent = (failures - 1).min(16);
        return INITIAL_BACKOFF.saturating_mul(1 << exponent).min(cap);
    }

    manager.current().map_or(Duration::ZERO, |token| {
        (token.issued_at() + config.interval).saturating_duration_since(Instant::now())
    })
}
