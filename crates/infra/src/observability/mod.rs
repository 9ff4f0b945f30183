//! Observability
//!
//! Structured logging through `tracing`. Components emit stable event names
//! (`upstream_attempt`, `upstream_retry`, `session_refreshed`,
//! `session_refresh_failed`, `batch_completed`) so log pipelines can match on
//! them; secrets never appear in fields.

pub mod logging;

pub use logging::{init_tracing, LogFormat};
