//! Session token seam for the gateway

use std::sync::Arc;

use async_trait::async_trait;
use grocy_domain::GatewayError;

use crate::session::{SessionToken, SessionTokenManager};

/// Provider of the ingress session attached to upstream calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid token.
    ///
    /// # Errors
    /// Returns an `Auth(Unavailable)` error if none can be obtained.
    async fn token(&self) -> Result<Arc<SessionToken>, GatewayError>;

    /// A replacement for `stale`, which the backend just rejected.
    ///
    /// # Errors
    /// Returns an `Auth(Unavailable)` error if no replacement can be obtained.
    async fn refresh_after_rejection(
        &self,
        stale: &SessionToken,
    ) -> Result<Arc<SessionToken>, GatewayError>;
}

#[async_trait]
impl TokenSource for SessionTokenManager {
    async fn token(&self) -> Result<Arc<SessionToken>, GatewayError> {
        self.get_token().await
    }

    async fn refresh_after_rejection(
        &self,
        stale: &SessionToken,
    ) -> Result<Arc<SessionToken>, GatewayError> {
        SessionTokenManager::refresh_after_rejection(self, stale).await
    }
}
