//! Gateway constants
//!
//! Defaults for every tunable in [`crate::config::GatewayConfig`], plus the
//! header and cookie names the Grocy add-on expects behind Home Assistant
//! ingress.

// Upstream addressing
pub const DEFAULT_BACKEND_URL: &str = "http://homeassistant.local:9192/api";
pub const INGRESS_PATH_MARKER: &str = "/api/hassio_ingress";
pub const DEFAULT_API_KEY_HEADER: &str = "GROCY-API-KEY";
pub const DEFAULT_SESSION_COOKIE: &str = "ingress_session";

// Session lifecycle
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 55;
pub const DEFAULT_ISSUE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_ISSUE_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_REFRESH_BACKOFF_SECS: u64 = 30;

// Request retry
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 200;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// Batch fan-out
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

// Logging
pub const MAX_LOGGED_BODY_CHARS: usize = 200;
