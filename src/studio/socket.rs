//! Studio Realtime Channel
//!
//! WebSocket client for push progress and completion events. The
//! channel is authenticated with a short-lived token issued over REST,
//! never reconnects on its own (the completion poller decides whether
//! to fall back to HTTP polling), and treats push payloads as hints
//! only: terminal states are always confirmed by re-fetching the
//! authoritative status over the transport client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::types::{ProgressUpdate, ProjectStatus};

use super::client::StudioClient;
use super::error::{StudioError, StudioResult};
use super::poller::{is_terminal_status, normalize_status};

/// How long to wait for the server-side verification acknowledgment.
const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

const SOCKET_PATH: &str = "/socket";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event frame pushed over the channel.
#[derive(Debug, Deserialize)]
struct SocketEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

pub struct SocketClient {
    client: Arc<StudioClient>,
    socket_url: Url,
    ws: Option<WsStream>,
}

impl SocketClient {
    /// Create a disconnected channel client. `socket_url` overrides the
    /// endpoint derived from the transport client's base URL.
    pub fn new(client: Arc<StudioClient>, socket_url: Option<&str>) -> StudioResult<Self> {
        let raw = socket_url.unwrap_or_else(|| client.base_url());
        let socket_url = derive_socket_url(raw)?;
        Ok(Self {
            client,
            socket_url,
            ws: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_some()
    }

    /// Obtain a verification token over REST, open the channel, and
    /// wait for the server's verification acknowledgment.
    pub async fn connect(&mut self) -> StudioResult<()> {
        let token_response = self.client.get_socket_token().await?;
        let token = token_response
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                StudioError::new(
                    "socket_token_missing",
                    502,
                    "Failed to obtain socket token",
                )
            })?;

        let mut url = self.socket_url.clone();
        url.query_pairs_mut().append_pair("token", token);

        let mut request = url.as_str().into_client_request().map_err(|e| {
            StudioError::new("socket_connect_failed", 502, format!("Bad socket URL: {}", e))
        })?;
        if let Some(basic) = self.client.auth().basic_header() {
            request.headers_mut().insert(
                AUTHORIZATION,
                basic.parse().map_err(|_| {
                    StudioError::new("socket_connect_failed", 502, "Invalid basic auth header")
                })?,
            );
        }

        let deadline = Instant::now() + VERIFICATION_TIMEOUT;

        let (mut ws, _) = match timeout_at(deadline, connect_async(request)).await {
            Err(_) => return Err(StudioError::timeout("Socket verification timed out")),
            Ok(Err(e)) => {
                return Err(StudioError::new(
                    "socket_connect_failed",
                    502,
                    format!("Socket connection error: {}", e),
                ))
            }
            Ok(Ok(pair)) => pair,
        };

        // Handshake: wait for the verification acknowledgment before the
        // channel is considered usable.
        loop {
            let message = match timeout_at(deadline, ws.next()).await {
                Err(_) => return Err(StudioError::timeout("Socket verification timed out")),
                Ok(None) => {
                    return Err(StudioError::new(
                        "socket_disconnected",
                        502,
                        "Socket closed during verification",
                    ))
                }
                Ok(Some(Err(e))) => {
                    return Err(StudioError::new(
                        "socket_connect_failed",
                        502,
                        format!("Socket connection error: {}", e),
                    ))
                }
                Ok(Some(Ok(message))) => message,
            };

            let Some(event) = parse_event(&message) else {
                if message.is_close() {
                    return Err(StudioError::new(
                        "socket_disconnected",
                        502,
                        "Socket closed during verification",
                    ));
                }
                continue;
            };

            match event.event.as_str() {
                "verification_success" => break,
                "verification_error" | "connect_error" => {
                    let reason = event
                        .data
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    return Err(StudioError::new(
                        "socket_verification_failed",
                        502,
                        format!("Socket verification failed: {}", reason),
                    ));
                }
                other => {
                    debug!("ignoring pre-verification event: {}", other);
                }
            }
        }

        self.ws = Some(ws);
        Ok(())
    }

    /// Wait for the given project to reach a terminal state via pushed
    /// events, reporting intermediate progress through `on_progress`.
    ///
    /// The first qualifying event wins: the loop returns immediately on
    /// a terminal event (after confirming over HTTP), on disconnect, or
    /// when `timeout` elapses.
    pub async fn wait_for_completion(
        &mut self,
        project_id: &str,
        timeout: Duration,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> StudioResult<ProjectStatus> {
        let ws = self.ws.as_mut().ok_or_else(|| {
            StudioError::new("socket_not_connected", 500, "Socket not connected")
        })?;

        let deadline = Instant::now() + timeout;
        let timeout_minutes = (timeout.as_secs() + 30) / 60;

        loop {
            let message = match timeout_at(deadline, ws.next()).await {
                Err(_) => {
                    return Err(StudioError::timeout(format!(
                        "Socket polling timed out after {} minutes",
                        timeout_minutes
                    )))
                }
                Ok(None) => {
                    return Err(StudioError::new(
                        "socket_disconnected",
                        502,
                        "Socket disconnected during polling",
                    ))
                }
                Ok(Some(Err(e))) => {
                    return Err(StudioError::new(
                        "socket_disconnected",
                        502,
                        format!("Socket error during polling: {}", e),
                    ))
                }
                Ok(Some(Ok(message))) => message,
            };

            let Some(event) = parse_event(&message) else {
                if message.is_close() {
                    return Err(StudioError::new(
                        "socket_disconnected",
                        502,
                        "Socket disconnected during polling",
                    ));
                }
                continue;
            };

            if event.data.get("projectId").and_then(Value::as_str) != Some(project_id) {
                continue;
            }

            match event.event.as_str() {
                "video_render_progress" => {
                    on_progress(ProgressUpdate {
                        project_id: project_id.to_string(),
                        status: "rendering".to_string(),
                        progress: event.data.get("progress").and_then(Value::as_f64),
                        retention_time_remaining: None,
                    });
                }
                "video_render_end" | "video_render_error" => {
                    // Push payloads are not authoritative; confirm over HTTP.
                    return self.client.get_project_status(project_id).await;
                }
                "video_project_core_updated" => {
                    let status = event
                        .data
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("");
                    if is_terminal_status(&normalize_status(status)) {
                        return self.client.get_project_status(project_id).await;
                    }
                    on_progress(ProgressUpdate {
                        project_id: project_id.to_string(),
                        status: status.to_string(),
                        progress: event.data.get("progress").and_then(Value::as_f64),
                        retention_time_remaining: None,
                    });
                }
                other => {
                    debug!("ignoring event: {}", other);
                }
            }
        }
    }

    /// Close the channel. Safe to call repeatedly and when never
    /// connected.
    pub async fn disconnect(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            let _ = ws.send(Message::Close(None)).await;
            let _ = ws.close(None).await;
        }
    }
}

fn parse_event(message: &Message) -> Option<SocketEvent> {
    match message {
        Message::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Derive the websocket endpoint from an HTTP base URL. `ws://` and
/// `wss://` URLs pass through with only the path normalized.
fn derive_socket_url(raw: &str) -> StudioResult<Url> {
    let mut url = Url::parse(raw.trim_end_matches('/')).map_err(|e| {
        StudioError::new(
            "invalid_endpoint",
            400,
            format!("Invalid socket URL '{}': {}", raw, e),
        )
    })?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => url.scheme(),
        other => {
            return Err(StudioError::new(
                "invalid_endpoint",
                400,
                format!("Unsupported socket scheme '{}'", other),
            ))
        }
    }
    .to_string();

    url.set_scheme(&scheme)
        .map_err(|_| StudioError::new("invalid_endpoint", 400, "Cannot set socket scheme"))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path(SOCKET_PATH);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_socket_url_schemes() {
        assert_eq!(
            derive_socket_url("https://framecut.app").unwrap().as_str(),
            "wss://framecut.app/socket"
        );
        assert_eq!(
            derive_socket_url("http://localhost:3100").unwrap().as_str(),
            "ws://localhost:3100/socket"
        );
        assert_eq!(
            derive_socket_url("wss://push.framecut.app/events")
                .unwrap()
                .as_str(),
            "wss://push.framecut.app/events"
        );
        assert!(derive_socket_url("ftp://x").is_err());
    }

    #[test]
    fn test_parse_event_text_only() {
        let event = parse_event(&Message::Text(
            r#"{"event":"video_render_progress","data":{"projectId":"p1","progress":42}}"#.into(),
        ))
        .unwrap();
        assert_eq!(event.event, "video_render_progress");
        assert_eq!(event.data["progress"], 42);

        assert!(parse_event(&Message::Binary(vec![1, 2, 3].into())).is_none());
        assert!(parse_event(&Message::Text("not json".into())).is_none());
    }
}
