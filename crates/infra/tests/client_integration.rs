//! End-to-end tests for the assembled client against a real HTTP server.

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_core::retry::RetryOptions;
use beacon_domain::{ApiError, ApiRequest, ErrorKind, Method};
use beacon_infra::ApiClient;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::builder(server.uri()).build().expect("client should build")
}

#[tokio::test]
async fn attaches_the_stored_credential_as_a_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"id": 1}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.credentials().store("token-1", None, Some(true)).unwrap();

    let envelope = client.get("/api/me").await.expect("response");
    assert_eq!(envelope.data, Some(json!({"id": 1})));
}

#[tokio::test]
async fn refreshes_the_credential_and_replays_after_a_401() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(401).set_body_json(json!({"message": "expired"}))
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"id": 7}}))
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": {"accessToken": "renewed"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.credentials().store("stale-token", None, Some(true)).unwrap();

    let envelope = client.get("/api/me").await.expect("replayed response");

    assert_eq!(envelope.data, Some(json!({"id": 7})));
    assert_eq!(client.credentials().token().unwrap().as_deref(), Some("renewed"));
}

#[tokio::test]
async fn failed_refresh_rejects_with_the_refresh_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "no session"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.credentials().store("stale-token", None, Some(false)).unwrap();

    let result = client.get("/api/me").await;

    assert!(matches!(result, Err(ApiError::Status { status: 401, .. })));
    assert_eq!(client.credentials().token().unwrap(), None);
}

#[tokio::test]
async fn retries_server_errors_until_success() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "data": {"ok": true}}))
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = RetryOptions::default()
        .with_retries(2)
        .with_base_delay(Duration::from_millis(10));

    let outcome = client
        .call_with(ApiRequest::new(Method::Get, "/api/flaky"), &options)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.data(), Some(&json!({"ok": true})));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn serves_repeat_gets_from_cache_until_invalidated() {
    let server = MockServer::start().await;
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = hits.clone();

    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            let n = hits_clone.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"version": n}}))
        })
        .mount(&server)
        .await;

    let client = client_for(&server);

    let first = client.get("/api/users").await.unwrap();
    let second = client.get("/api/users").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert_eq!(client.invalidate("/api/users"), 1);

    let third = client.get("/api/users").await.unwrap();
    assert_eq!(third.data, Some(json!({"version": 1})));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_identical_gets_reach_the_server_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"id": 1}}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = ApiRequest::new(Method::Get, "/api/slow");

    let (a, b, c) = tokio::join!(
        client.request(request.clone()),
        client.request(request.clone()),
        client.request(request.clone()),
    );

    let first = a.unwrap();
    assert_eq!(first, b.unwrap());
    assert_eq!(first, c.unwrap());

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn maps_validation_bodies_onto_the_error_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation failed",
            "errors": [{"field": "email", "message": "is invalid"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let outcome = client
        .call(ApiRequest::new(Method::Post, "/api/users").with_data(json!({"email": "x"})))
        .await;

    let info = outcome.error_info().expect("failure outcome");
    assert_eq!(info.kind, ErrorKind::Validation);
    assert_eq!(info.status, 422);
    assert_eq!(info.message, "Validation failed");
    assert_eq!(info.errors.len(), 1);
    assert_eq!(info.errors[0].field(), Some("email"));
}

#[tokio::test]
async fn transport_deadline_surfaces_as_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = ApiClient::builder(server.uri())
        .timeout(Duration::from_millis(50))
        .build()
        .expect("client should build");

    let result = client.get("/api/slow").await;
    assert!(matches!(result, Err(ApiError::Timeout)));
}

#[tokio::test]
async fn refused_connections_classify_as_offline() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener); // release the port so requests fail with ECONNREFUSED
    let url = format!("http://{addr}");

    let client = ApiClient::builder(url).build().expect("client should build");
    let outcome = client.call(ApiRequest::new(Method::Get, "/api/users")).await;

    let info = outcome.error_info().expect("failure outcome");
    assert_eq!(info.status, 0);
    assert!(info.kind.is_network_error());
}

#[tokio::test]
async fn bare_json_bodies_are_wrapped_into_the_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/raw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let envelope = client.get("/api/raw").await.unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.data, Some(json!({"id": 42})));
}
