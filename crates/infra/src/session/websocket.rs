//! Session issuing over the Home Assistant websocket API
//!
//! Flow: `auth_required` → `auth` (host access token) → `auth_ok` →
//! `supervisor/api` call for `/ingress/session` → `result.session`.
//! Each issue opens its own connection; sessions are requested about once a
//! minute, so connection reuse buys nothing worth the reconnect logic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use grocy_domain::constants::INGRESS_PATH_MARKER;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

use super::issuer::{IssueError, SessionIssuer};

type HostSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Issues ingress sessions through the supervisor websocket API
pub struct SupervisorWsIssuer {
    ws_url: String,
    access_token: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl SupervisorWsIssuer {
    /// # Errors
    /// Returns `IssueError::Protocol` if no websocket URL can be derived
    /// from `host_url`.
    pub fn new(
        host_url: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, IssueError> {
        Ok(Self {
            ws_url: websocket_url(host_url)?,
            access_token: access_token.into(),
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    async fn request_session(&self) -> Result<String, IssueError> {
        let (mut socket, _) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| IssueError::Connect(e.to_string()))?;

        let greeting = next_json(&mut socket).await?;
        if message_type(&greeting) != Some("auth_required") {
            return Err(IssueError::Protocol(format!("expected auth_required, got {greeting}")));
        }

        send_json(&mut socket, &json!({"type": "auth", "access_token": self.access_token}))
            .await?;

        let auth_reply = next_json(&mut socket).await?;
        match message_type(&auth_reply) {
            Some("auth_ok") => {}
            Some("auth_invalid") => {
                let reason = auth_reply
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("auth_invalid")
                    .to_string();
                return Err(IssueError::Rejected(reason));
            }
            _ => return Err(IssueError::Protocol(format!("expected auth_ok, got {auth_reply}"))),
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        send_json(
            &mut socket,
            &json!({
                "id": id,
                "type": "supervisor/api",
                "endpoint": "/ingress/session",
                "method": "post",
            }),
        )
        .await?;

        // Skip event messages until the reply to our call arrives
        let reply = loop {
            let message = next_json(&mut socket).await?;
            if message.get("id").and_then(Value::as_u64) == Some(id) {
                break message;
            }
        };

        // Best effort; the session is already issued
        let _ = socket.close(None).await;

        session_from_reply(&reply)
    }
}

#[async_trait]
impl SessionIssuer for SupervisorWsIssuer {
    #[instrument(skip(self), fields(url = %self.ws_url))]
    async fn issue(&self) -> Result<String, IssueError> {
        debug!("Requesting ingress session over websocket");
        tokio::time::timeout(self.timeout, self.request_session())
            .await
            .map_err(|_| IssueError::Timeout(self.timeout))?
    }
}

/// Derive the websocket endpoint from a host or ingress URL.
///
/// Everything from the ingress path marker onwards is dropped, the scheme is
/// switched to `ws`/`wss` and `/api/websocket` is appended.
///
/// # Errors
/// Returns `IssueError::Protocol` for URLs that are not http(s) or ws(s).
pub fn websocket_url(host_url: &str) -> Result<String, IssueError> {
    let base = host_url.find(INGRESS_PATH_MARKER).map_or(host_url, |pos| &host_url[..pos]);
    let base = base.trim_end_matches('/');

    let switched = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(IssueError::Protocol(format!("unsupported host URL scheme: {host_url}")));
    };

    Ok(format!("{switched}/api/websocket"))
}

fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

fn session_from_reply(reply: &Value) -> Result<String, IssueError> {
    if reply.get("success").and_then(Value::as_bool) != Some(true) {
        let reason = reply
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map_or_else(|| reply.to_string(), str::to_string);
        return Err(IssueError::Protocol(format!("session request failed: {reason}")));
    }

    reply
        .pointer("/result/session")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IssueError::Protocol("reply carries no session".to_string()))
}

async fn send_json(socket: &mut HostSocket, payload: &Value) -> Result<(), IssueError> {
    socket
        .send(Message::text(payload.to_string()))
        .await
        .map_err(|e| IssueError::Connect(e.to_string()))
}

async fn next_json(socket: &mut HostSocket) -> Result<Value, IssueError> {
    loop {
        match socket.next().await {
            None => return Err(IssueError::Protocol("connection closed by host".to_string())),
            Some(Err(e)) => return Err(IssueError::Connect(e.to_string())),
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text)
                    .map_err(|e| IssueError::Protocol(format!("invalid JSON from host: {e}")));
            }
            Some(Ok(Message::Close(_))) => {
                return Err(IssueError::Protocol("connection closed by host".to_string()));
            }
            Some(Ok(_)) => {}
        }
    }
}
