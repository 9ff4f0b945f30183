//! Ingress session lifecycle
//!
//! - [`SessionIssuer`]: obtains a new session from the host
//!   ([`SupervisorWsIssuer`] over websocket, [`IngressHttpIssuer`] over REST)
//! - [`SessionTokenManager`]: holds the current token and coalesces refreshes
//! - [`TokenRefresher`]: background task refreshing ahead of expiry

pub mod ingress;
pub mod issuer;
pub mod manager;
pub mod refresher;
pub mod token;
pub mod websocket;

pub use ingress::IngressHttpIssuer;
pub use issuer::{IssueError, SessionIssuer};
pub use manager::{SessionSettings, SessionTokenManager};
pub use refresher::{RefresherConfig, RefresherError, TokenRefresher};
pub use token::SessionToken;
pub use websocket::{websocket_url, SupervisorWsIssuer};
