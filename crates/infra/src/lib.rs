//! # Grocy Gateway Infrastructure
//!
//! Authenticated gateway and batch orchestration for the Grocy REST API
//! behind Home Assistant ingress.
//!
//! This crate contains:
//! - HTTP client and error classification
//! - Ingress session issuing, caching and periodic refresh
//! - The request gateway (auth headers, timeout, retry policy)
//! - The batch orchestrator and stock/shopping list batch operations
//! - Configuration loading, tracing setup and runtime wiring
//!
//! ## Architecture
//! - Pure types live in `grocy-domain`; retry primitives in `grocy-common`
//! - Contains all "impure" code (network I/O, background tasks)

pub mod batch;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod observability;
pub mod runtime;
pub mod session;

// Re-export commonly used items
pub use batch::{BatchOperation, BatchOrchestrator};
pub use credentials::CredentialStore;
pub use errors::{InfraError, SendPhase};
pub use gateway::{Gateway, GatewaySettings, RequestExecutor, TokenSource};
pub use http::{HttpClient, HttpClientBuilder, RawResponse};
pub use runtime::GatewayRuntime;
pub use session::{SessionToken, SessionTokenManager, TokenRefresher};
