//! # Grocy Gateway Domain
//!
//! Data model shared by the gateway crates.
//!
//! This crate contains:
//! - Credentials and request/result types for upstream calls
//! - The error taxonomy every surfaced failure is classified into
//! - Batch item and batch result types
//! - Configuration structures and defaults
//!
//! ## Architecture
//! - No dependencies on other gateway crates
//! - No I/O, no async runtime
//! - Pure data structures plus the small amount of logic that is derivable
//!   from them (status classification, batch tri-state)

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
