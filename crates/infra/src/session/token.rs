//! Short-lived upstream session token

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// An ingress session token with its validity window.
///
/// Immutable; a refresh replaces the whole value. `generation` increases by
/// one with every successful refresh so an auth rejection can be tied to the
/// token that caused it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    issued_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl SessionToken {
    pub fn new(value: impl Into<String>, issued_at: Instant, ttl: Duration, generation: u64) -> Self {
        Self { value: value.into(), issued_at, ttl, generation }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub const fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn expires_at(&self) -> Instant {
        self.issued_at + self.ttl
    }

    /// Valid strictly before `issued_at + ttl`
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at().saturating_duration_since(Instant::now())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_token_expires_at_ttl_boundary() {
        let token = SessionToken::new("abc", Instant::now(), Duration::from_secs(60), 1);

        assert!(token.is_valid());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(token.is_valid());
        assert_eq!(token.remaining(), Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!token.is_valid());
        assert_eq!(token.remaining(), Duration::ZERO);
    }

    #[test]
    fn test_debug_hides_value() {
        let token = SessionToken::new("secret-session", Instant::now(), Duration::from_secs(60), 3);
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret-session"));
        assert!(rendered.contains("generation: 3"));
    }
}
