//! Realtime channel and completion poller integration tests: a local
//! WebSocket server pushes events while a mock API serves the token
//! and authoritative status endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use httpmock::prelude::*;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use framecut_gateway::studio::client::{AuthContext, StudioClient, StudioClientOptions};
use framecut_gateway::studio::poller::{CompletionPoller, PollOptions, PollPath};
use framecut_gateway::studio::socket::SocketClient;

fn client_for(server: &MockServer) -> Arc<StudioClient> {
    Arc::new(
        StudioClient::new(StudioClientOptions {
            api_endpoint: server.base_url(),
            auth: AuthContext::new(Some("fk_test".into()), None, None),
            max_retries: 0,
            ..StudioClientOptions::default()
        })
        .unwrap(),
    )
}

async fn mock_socket_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/socket");
            then.status(200)
                .json_body(json!({"success": true, "data": {"token": "sock-token-1"}}));
        })
        .await
}

async fn mock_status<'a>(server: &'a MockServer, status: &str) -> httpmock::Mock<'a> {
    let body = json!({
        "success": true,
        "data": {"status": status, "progress": 100.0, "resultsUrl": "/projects/p1/results"}
    });
    server
        .mock_async(move |when, then| {
            when.method(GET).path("/api/v1/projects/p1/status");
            then.status(200).json_body(body.clone());
        })
        .await
}

/// Spawn a one-connection WebSocket server that pushes the given event
/// frames, then optionally holds the connection open.
async fn spawn_ws_server(events: Vec<String>, hold_open: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        for event in events {
            if ws.send(Message::Text(event)).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if hold_open {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
    });

    addr
}

fn event(name: &str, data: serde_json::Value) -> String {
    json!({"event": name, "data": data}).to_string()
}

#[tokio::test]
async fn socket_resolves_completion_via_authoritative_status() {
    let server = MockServer::start_async().await;
    mock_socket_token(&server).await;
    let status = mock_status(&server, "completed").await;

    let addr = spawn_ws_server(
        vec![
            event("verification_success", json!({})),
            event(
                "video_render_progress",
                json!({"projectId": "p1", "progress": 40}),
            ),
            // Events for other projects must be ignored.
            event(
                "video_render_progress",
                json!({"projectId": "other", "progress": 90}),
            ),
            event("video_render_end", json!({"projectId": "p1"})),
        ],
        true,
    )
    .await;

    let mut socket = SocketClient::new(
        client_for(&server),
        Some(&format!("ws://{}", addr)),
    )
    .unwrap();
    socket.connect().await.unwrap();

    let mut progress_updates = Vec::new();
    let result = socket
        .wait_for_completion("p1", Duration::from_secs(10), &mut |update| {
            progress_updates.push(update)
        })
        .await
        .unwrap();

    assert_eq!(result.status, "completed");
    // The push payload never resolves completion on its own.
    status.assert_hits_async(1).await;
    assert_eq!(progress_updates.len(), 1);
    assert_eq!(progress_updates[0].status, "rendering");
    assert_eq!(progress_updates[0].progress, Some(40.0));

    socket.disconnect().await;
    socket.disconnect().await; // idempotent
}

#[tokio::test]
async fn socket_terminal_core_update_resolves() {
    let server = MockServer::start_async().await;
    mock_socket_token(&server).await;
    mock_status(&server, "failed").await;

    let addr = spawn_ws_server(
        vec![
            event("verification_success", json!({})),
            event(
                "video_project_core_updated",
                json!({"projectId": "p1", "status": "Editing", "progress": 10}),
            ),
            event(
                "video_project_core_updated",
                json!({"projectId": "p1", "status": "Failed"}),
            ),
        ],
        true,
    )
    .await;

    let mut socket =
        SocketClient::new(client_for(&server), Some(&format!("ws://{}", addr))).unwrap();
    socket.connect().await.unwrap();

    let mut updates = Vec::new();
    let result = socket
        .wait_for_completion("p1", Duration::from_secs(10), &mut |u| updates.push(u))
        .await
        .unwrap();

    assert_eq!(result.status, "failed");
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, "Editing");
}

#[tokio::test]
async fn verification_error_rejects_connect() {
    let server = MockServer::start_async().await;
    mock_socket_token(&server).await;

    let addr = spawn_ws_server(
        vec![event(
            "verification_error",
            json!({"message": "bad token"}),
        )],
        true,
    )
    .await;

    let mut socket =
        SocketClient::new(client_for(&server), Some(&format!("ws://{}", addr))).unwrap();
    let err = socket.connect().await.unwrap_err();
    assert_eq!(err.code, "socket_verification_failed");
    assert!(err.message.contains("bad token"));
    assert!(!socket.is_connected());
}

#[tokio::test]
async fn missing_token_fails_fast() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/socket");
            then.status(200).json_body(json!({"success": true, "data": {}}));
        })
        .await;

    let mut socket =
        SocketClient::new(client_for(&server), Some("ws://127.0.0.1:9")).unwrap();
    let err = socket.connect().await.unwrap_err();
    assert_eq!(err.code, "socket_token_missing");
}

#[tokio::test]
async fn wait_without_connect_rejects() {
    let server = MockServer::start_async().await;
    let mut socket =
        SocketClient::new(client_for(&server), Some("ws://127.0.0.1:9")).unwrap();
    let err = socket
        .wait_for_completion("p1", Duration::from_secs(1), &mut |_| {})
        .await
        .unwrap_err();
    assert_eq!(err.code, "socket_not_connected");
}

#[tokio::test]
async fn poller_falls_back_to_http_when_realtime_fails() {
    let server = MockServer::start_async().await;
    let token = mock_socket_token(&server).await;
    mock_status(&server, "completed").await;

    // Nothing listens on the socket endpoint: the realtime stage fails
    // and the caller only sees the HTTP result.
    let poller = CompletionPoller::new(client_for(&server), Some("ws://127.0.0.1:9".to_string()));
    let outcome = poller
        .wait("p1", PollOptions::default(), &mut |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.via, PollPath::Http);
    assert_eq!(outcome.status.status, "completed");
    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn poller_race_guard_resolves_terminal_status_after_connect() {
    let server = MockServer::start_async().await;
    mock_socket_token(&server).await;
    let status = mock_status(&server, "completed").await;

    // The channel verifies but never pushes job events; the immediate
    // post-connect status check must resolve the wait.
    let addr = spawn_ws_server(vec![event("verification_success", json!({}))], true).await;

    let poller = CompletionPoller::new(client_for(&server), Some(format!("ws://{}", addr)));
    let outcome = poller
        .wait("p1", PollOptions::default(), &mut |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.via, PollPath::Realtime);
    status.assert_hits_async(1).await;
}

#[tokio::test]
async fn poller_force_http_skips_the_realtime_stage() {
    let server = MockServer::start_async().await;
    let token = mock_socket_token(&server).await;
    mock_status(&server, "completed").await;

    let poller = CompletionPoller::new(client_for(&server), None);
    let outcome = poller
        .wait(
            "p1",
            PollOptions {
                force_http: true,
                ..PollOptions::default()
            },
            &mut |_| {},
        )
        .await
        .unwrap();

    assert_eq!(outcome.via, PollPath::Http);
    token.assert_hits_async(0).await;
}
