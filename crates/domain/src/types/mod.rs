//! Domain types and models
//!
//! Types exchanged between the tool layer, the batch orchestrator and the
//! request gateway.

pub mod batch;
pub mod credentials;
pub mod request;
pub mod result;

// Re-export for convenience
pub use batch::{BatchFailure, BatchItem, BatchResult, BatchStatus, BatchSuccess};
pub use credentials::{AuthTokenSource, Credentials};
pub use request::{GatewayRequest, Method};
pub use result::{AuthFailure, ErrorKind, GatewayError, GatewayResult, StatusClass};
