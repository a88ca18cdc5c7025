//! Transport client integration tests against live local servers:
//! retry/backoff behavior, rate-limit handling, envelope unwrapping,
//! and auth header injection.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use reqwest::Method;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use framecut_gateway::studio::client::{
    AuthContext, RequestOptions, StudioClient, StudioClientOptions,
};

fn client_for(server: &MockServer, max_retries: u32) -> StudioClient {
    StudioClient::new(StudioClientOptions {
        api_endpoint: server.base_url(),
        auth: AuthContext::new(Some("fk_test".into()), None, None),
        max_retries,
        ..StudioClientOptions::default()
    })
    .unwrap()
}

#[tokio::test]
async fn persistent_500_makes_exactly_n_plus_one_attempts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits");
            then.status(500)
                .json_body(json!({"success": false, "error": {"code": "server_down", "message": "nope"}}));
        })
        .await;

    let client = client_for(&server, 2);
    let err = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap_err();

    mock.assert_hits_async(3).await;
    assert_eq!(err.code, "server_down");
    assert_eq!(err.status, 500);
}

#[tokio::test]
async fn eventual_success_after_two_500s() {
    // Scripted raw server: 500, 500, then a 200 envelope. Connections
    // are closed after each response so every attempt is observable.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let bodies = [
            (500, r#"{"success":false,"error":{"code":"flaky","message":"boom"}}"#),
            (500, r#"{"success":false,"error":{"code":"flaky","message":"boom"}}"#),
            (200, r#"{"success":true,"data":{"ok":true}}"#),
        ];
        let mut served = 0usize;
        while served < bodies.len() {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await.unwrap();

            let (status, body) = bodies[served];
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            served += 1;
        }
        served
    });

    let client = StudioClient::new(StudioClientOptions {
        api_endpoint: format!("http://{}", addr),
        auth: AuthContext::new(Some("fk_test".into()), None, None),
        max_retries: 3,
        ..StudioClientOptions::default()
    })
    .unwrap();

    let value = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(value, json!({"ok": true}));
    assert_eq!(handle.await.unwrap(), 3);
}

#[tokio::test]
async fn rate_limit_honors_retry_after() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let responses = [
            (429, "retry-after: 1\r\n", r#"{"success":false}"#),
            (200, "", r#"{"success":true,"data":{"after":"limit"}}"#),
        ];
        for (status, extra, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {} X\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                extra,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        }
    });

    let client = StudioClient::new(StudioClientOptions {
        api_endpoint: format!("http://{}", addr),
        auth: AuthContext::new(Some("fk_test".into()), None, None),
        max_retries: 3,
        ..StudioClientOptions::default()
    })
    .unwrap();

    let started = std::time::Instant::now();
    let value = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(value, json!({"after": "limit"}));
    // The enforced minimum wait is 1000ms.
    assert!(started.elapsed() >= Duration::from_millis(1000));
    handle.await.unwrap();
}

#[tokio::test]
async fn envelope_failure_on_200_is_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits");
            then.status(200).json_body(json!({
                "success": false,
                "error": {"code": "quota_exceeded", "message": "No quota left"}
            }));
        })
        .await;

    let client = client_for(&server, 3);
    let err = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap_err();

    mock.assert_hits_async(1).await;
    assert_eq!(err.code, "quota_exceeded");
    assert_eq!(err.message, "No quota left");
}

#[tokio::test]
async fn non_retryable_4xx_fails_on_first_attempt() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/projects/p1/status");
            then.status(404)
                .json_body(json!({"success": false, "error": {"code": "not_found", "message": "missing"}}));
        })
        .await;

    let client = client_for(&server, 3);
    let err = client
        .request(Method::GET, "/projects/p1/status", RequestOptions::default())
        .await
        .unwrap_err();

    mock.assert_hits_async(1).await;
    assert_eq!(err.code, "not_found");
    assert_eq!(err.status, 404);
}

#[tokio::test]
async fn envelope_unwraps_data_and_passes_bare_payloads() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits");
            then.status(200)
                .json_body(json!({"success": true, "data": {"apiCredits": {"total": 7}}}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/pricing");
            then.status(200).json_body(json!({"plans": ["starter"]}));
        })
        .await;

    let client = client_for(&server, 0);
    let unwrapped = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(unwrapped, json!({"apiCredits": {"total": 7}}));

    let bare = client
        .request(Method::GET, "/pricing", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(bare, json!({"plans": ["starter"]}));
}

#[tokio::test]
async fn auth_headers_reach_the_wire() {
    let server = MockServer::start_async().await;
    let keyed = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v1/credits")
                .header("x-api-key", "fk_test")
                .header_exists("user-agent");
            then.status(200).json_body(json!({"success": true, "data": {}}));
        })
        .await;

    let client = client_for(&server, 0);
    client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    keyed.assert_hits_async(1).await;
}

#[tokio::test]
async fn missing_auth_fails_before_any_network_call() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits");
            then.status(200).json_body(json!({"success": true}));
        })
        .await;

    let client = StudioClient::new(StudioClientOptions {
        api_endpoint: server.base_url(),
        auth: AuthContext::new(None, None, Some("user:pass".into())),
        ..StudioClientOptions::default()
    })
    .unwrap();

    let err = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code, "missing_auth");
    mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn per_attempt_timeout_surfaces_as_timeout_error() {
    // A listener that accepts but never responds.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = stream.read(&mut buf).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let client = StudioClient::new(StudioClientOptions {
        api_endpoint: format!("http://{}", addr),
        auth: AuthContext::new(Some("fk_test".into()), None, None),
        max_retries: 0,
        ..StudioClientOptions::default()
    })
    .unwrap();

    let err = client
        .request(
            Method::GET,
            "/credits",
            RequestOptions::default().timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, "timeout");
    handle.abort();
}

#[tokio::test]
async fn shared_client_rotation_affects_subsequent_requests() {
    let server = MockServer::start_async().await;
    let old_key = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits").header("x-api-key", "fk_old");
            then.status(200).json_body(json!({"success": true, "data": {"key": "old"}}));
        })
        .await;
    let new_key = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v1/credits").header("x-api-key", "fk_new");
            then.status(200).json_body(json!({"success": true, "data": {"key": "new"}}));
        })
        .await;

    let client = Arc::new(
        StudioClient::new(StudioClientOptions {
            api_endpoint: server.base_url(),
            auth: AuthContext::new(Some("fk_old".into()), None, None),
            ..StudioClientOptions::default()
        })
        .unwrap(),
    );

    let first = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(first["key"], "old");

    client.rotate_auth(client.auth().with_api_key(Some("fk_new".into())));
    let second = client
        .request(Method::GET, "/credits", RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(second["key"], "new");

    old_key.assert_hits_async(1).await;
    new_key.assert_hits_async(1).await;
}
