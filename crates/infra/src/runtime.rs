//! Component wiring
//!
//! Builds the credential store, session issuer, token manager, refresher,
//! gateway and batch orchestrator from one validated [`GatewayConfig`].

use std::sync::Arc;
use std::time::Duration;

use grocy_common::resilience::RetryConfig;
use grocy_domain::{DomainError, GatewayConfig, IssuerKind, Result};
use tracing::{info, instrument, warn};

use crate::batch::BatchOrchestrator;
use crate::credentials::CredentialStore;
use crate::gateway::{Gateway, GatewaySettings};
use crate::session::{
    IngressHttpIssuer, RefresherConfig, SessionIssuer, SessionSettings, SessionTokenManager,
    SupervisorWsIssuer, TokenRefresher,
};

const ISSUE_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// The running gateway stack
pub struct GatewayRuntime {
    config: GatewayConfig,
    credentials: CredentialStore,
    sessions: SessionTokenManager,
    refresher: TokenRefresher,
    gateway: Gateway,
    orchestrator: BatchOrchestrator,
}

impl GatewayRuntime {
    /// Build every component and start the background refresher.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if the configuration is invalid or a
    /// client cannot be constructed.
    #[instrument(skip_all)]
    pub async fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let credentials = CredentialStore::from_config(&config)?;
        let issuer = build_issuer(&config, &credentials)?;
        Self::with_issuer(config, credentials, issuer).await
    }

    /// As [`Self::from_config`] with a caller-supplied session issuer.
    ///
    /// # Errors
    /// Returns `DomainError::Config` if a component cannot be constructed.
    pub async fn with_issuer(
        config: GatewayConfig,
        credentials: CredentialStore,
        issuer: Arc<dyn SessionIssuer>,
    ) -> Result<Self> {
        let session_retry = RetryConfig::builder()
            .max_attempts(config.session.max_issue_attempts)
            .exponential_backoff(ISSUE_RETRY_BASE_DELAY, 2.0, config.session.max_backoff())
            .equal_jitter()
            .build()
            .map_err(|e| DomainError::Config(e.to_string()))?;

        let sessions = SessionTokenManager::new(
            issuer,
            SessionSettings {
                ttl: config.session.ttl(),
                issue_timeout: config.session.issue_timeout(),
                retry: session_retry,
            },
        );

        let mut refresher = TokenRefresher::new(
            sessions.clone(),
            RefresherConfig {
                interval: config.session.refresh_interval(),
                max_backoff: config.session.max_backoff(),
            },
        );
        refresher.start().await.map_err(|e| DomainError::Internal(e.to_string()))?;

        let settings = GatewaySettings::from_config(&config, &credentials)?;
        let gateway = Gateway::new(settings, Arc::new(sessions.clone()))?;
        let orchestrator =
            BatchOrchestrator::new(Arc::new(gateway.clone()), config.batch.max_concurrency);

        info!(
            backend = %credentials.backend_base_url(),
            host = %credentials.host_url(),
            issuer = ?config.host.issuer,
            "Gateway runtime started"
        );

        Ok(Self { config, credentials, sessions, refresher, gateway, orchestrator })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn sessions(&self) -> &SessionTokenManager {
        &self.sessions
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn orchestrator(&self) -> &BatchOrchestrator {
        &self.orchestrator
    }

    /// Stop the background refresher
    pub async fn shutdown(mut self) {
        if let Err(e) = self.refresher.stop().await {
            warn!(error = %e, "Token refresher did not stop cleanly");
        }
        info!("Gateway runtime stopped");
    }
}

fn build_issuer(
    config: &GatewayConfig,
    credentials: &CredentialStore,
) -> Result<Arc<dyn SessionIssuer>> {
    let timeout = config.session.issue_timeout();
    let host = credentials.host_url();
    let token = credentials.host_access_token();

    let issuer: Arc<dyn SessionIssuer> = match config.host.issuer {
        IssuerKind::Websocket => Arc::new(
            SupervisorWsIssuer::new(host, token, timeout)
                .map_err(|e| DomainError::Config(e.to_string()))?,
        ),
        IssuerKind::Http => Arc::new(IngressHttpIssuer::new(host, token, timeout)?),
    };
    Ok(issuer)
}
