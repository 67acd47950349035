//! Tests for the HTTP client module

use super::*;
use crate::config::ClientConfig;
use crate::error::{AggregationStage, Error};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "token-abc";

#[derive(Debug, Deserialize, PartialEq)]
struct Customer {
    id: u64,
    name: String,
}

async fn mount_token(server: &MockServer, scope: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": scope,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .base_url(server.uri())
        .credentials("id", "secret")
        .timeout(Duration::from_secs(5))
        .max_retries(3)
        // Zero backoff keeps retry tests fast against a real socket
        .max_backoff(Duration::ZERO)
        .rate_limit(RateLimiterConfig::new(1000, 1000))
        .page_size(10)
        .build()
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(config(server)).unwrap()
}

fn page_json(items: &[u64], number: u32, last: bool) -> Value {
    json!({
        "content": items.iter().map(|id| json!({"id": id, "name": format!("c{id}")})).collect::<Vec<_>>(),
        "totalPages": 3,
        "totalElements": 30,
        "last": last,
        "first": number == 0,
        "size": 10,
        "number": number,
        "numberOfElements": items.len(),
        "empty": items.is_empty(),
    })
}

fn ids(range: std::ops::Range<u64>) -> Vec<u64> {
    range.collect()
}

// ============================================================================
// Request Config Tests
// ============================================================================

#[test]
fn test_request_config_builder() {
    let config = RequestConfig::new()
        .query("status", "open")
        .queries(&[("sort".to_string(), "id".to_string())])
        .shop(7)
        .json(json!({"k": "v"}));

    assert_eq!(config.query.len(), 2);
    assert_eq!(config.query[0], ("status".to_string(), "open".to_string()));
    assert_eq!(config.shop_id, 7);
    assert!(config.body.is_some());
}

#[test]
fn test_join_url() {
    assert_eq!(
        join_url("https://api.example.com/", "/api/v1/customers"),
        "https://api.example.com/api/v1/customers"
    );
    assert_eq!(
        join_url("https://api.example.com/base", "oauth/token"),
        "https://api.example.com/base/oauth/token"
    );
    assert_eq!(
        join_url("https://api.example.com", "https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[test]
fn test_new_rejects_invalid_config() {
    let result = ApiClient::new(ClientConfig::default());
    assert!(matches!(result, Err(Error::Config { .. })));
}

// ============================================================================
// Single Fetch Tests
// ============================================================================

#[tokio::test]
async fn test_get_json_sends_bearer_and_shop() {
    let server = MockServer::start().await;
    mount_token(&server, "2 3", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/customers/5"))
        .and(header("Authorization", "Bearer token-abc"))
        .and(query_param("shop", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let customer: Customer = client
        .get_json("/api/v1/customers/5", &[], 3, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        customer,
        Customer {
            id: 5,
            name: "Ada".to_string()
        }
    );
}

#[tokio::test]
async fn test_token_is_reused_across_requests() {
    let server = MockServer::start().await;
    mount_token(&server, "2", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/shops"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    for _ in 0..3 {
        let _: Value = client.get_json("/api/v1/shops", &[], 0, &cancel).await.unwrap();
    }
}

#[tokio::test]
async fn test_unauthorized_shop_makes_no_request() {
    let server = MockServer::start().await;
    mount_token(&server, "2 3", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let result: crate::Result<Value> = client
        .get_json("/api/v1/customers", &[], 42, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Unauthorized { shop_id: 42 })));
}

#[tokio::test]
async fn test_retries_5xx_then_succeeds() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let body: Value = client
        .get_json("/api/v1/flaky", &[], 0, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_retries_429() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = client(&server);
    let body: Value = client
        .get_json("/api/v1/busy", &[], 0, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_exhausted_retries_surface_temporary_error() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/down"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(4)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .get_json::<Value>("/api/v1/down", &[], 0, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_temporary());
    assert_eq!(err.status(), Some(503));
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn test_404_is_attempted_once() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/customers/999"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .get_json::<Customer>("/api/v1/customers/999", &[], 0, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Permanent { status: Some(404), .. }));
    assert!(!err.to_string().contains(TOKEN));
}

#[tokio::test]
async fn test_decode_failure_is_permanent() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/customers/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": "shape"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .get_json::<Customer>("/api/v1/customers/1", &[], 0, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Permanent { status: None, .. }));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/huge"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config(&server);
    config.max_response_bytes = 1024;
    let client = ApiClient::new(config).unwrap();

    let err = client
        .get_json::<Value>("/api/v1/huge", &[], 0, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(!err.is_temporary());
    assert!(err.to_string().contains("exceeds limit"));
}

#[tokio::test]
async fn test_resource_401_invalidates_token() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/secure"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/secure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();

    let first = client.get_json::<Value>("/api/v1/secure", &[], 0, &cancel).await;
    assert!(matches!(first, Err(Error::Permanent { status: Some(401), .. })));

    let second: Value = client.get_json("/api/v1/secure", &[], 0, &cancel).await.unwrap();
    assert_eq!(second["ok"], true);
}

#[tokio::test]
async fn test_late_401_keeps_newer_token() {
    let server = MockServer::start().await;

    for (token, calls) in [("token-old", 1), ("token-new", 1)] {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "token_type": "bearer",
                "expires_in": 3600,
                "scope": "1",
            })))
            .up_to_n_times(1)
            .expect(calls)
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/api/v1/slow"))
        .and(header("Authorization", "Bearer token-old"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancel = CancellationToken::new();

    // The slow request is still in flight on the old token when another
    // caller refreshes
    let slow = client.get_json::<Value>("/api/v1/slow", &[], 0, &cancel);
    let refresh = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.tokens().invalidate().await;
        client.tokens().ensure_authenticated().await
    };
    let (slow, fresh) = tokio::join!(slow, refresh);

    assert!(matches!(slow, Err(Error::Permanent { status: Some(401), .. })));
    assert_eq!(fresh.unwrap().secret(), "token-new");

    // No third exchange: the newer token survived the late 401
    let current = client.tokens().ensure_authenticated().await.unwrap();
    assert_eq!(current.secret(), "token-new");
}

#[tokio::test]
async fn test_connection_failure_is_temporary() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 1).await;

    let mut config = config(&server);
    config.max_retries = 1;
    let client = ApiClient::new(config).unwrap();

    // Port 9 (discard) is closed on test hosts; the connect fails fast
    let err = client
        .get_json::<Value>("http://127.0.0.1:9/nothing", &[], 0, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_temporary(), "{err:?}");
    assert!(err.status().is_none());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    mount_token(&server, "1", 0).await;

    let client = client(&server);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client.get_json::<Value>("/api/v1/anything", &[], 0, &cancel).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

// ============================================================================
// Pagination Tests
// ============================================================================

#[tokio::test]
async fn test_list_all_walks_pages_in_order() {
    let server = MockServer::start().await;
    mount_token(&server, "2", 1).await;

    for (number, range, last) in [(0, 0..10, false), (1, 10..20, false), (2, 20..30, true)] {
        Mock::given(method("GET"))
            .and(path("/api/v1/customers"))
            .and(query_param("page", number.to_string().as_str()))
            .and(query_param("size", "10"))
            .and(query_param("shop", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page_json(&ids(range), number, last)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client(&server);
    let result = client
        .list_all::<Customer>("/api/v1/customers", &[], 2, 10, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.items.len(), 30);
    assert_eq!(result.items[29].id, 29);
    assert_eq!(result.metadata.pages_traversed, 3);
    assert_eq!(result.metadata.records_fetched, 30);
}

#[tokio::test]
async fn test_list_until_stops_early_and_truncates() {
    let server = MockServer::start().await;
    mount_token(&server, "2", 1).await;

    for (number, expected) in [(0u32, 1u64), (1, 1), (2, 0)] {
        let start = u64::from(number) * 10;
        Mock::given(method("GET"))
            .and(path("/api/v1/repair-orders"))
            .and(query_param("page", number.to_string().as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_json(&ids(start..start + 10), number, false)),
            )
            .expect(expected)
            .mount(&server)
            .await;
    }

    let client = client(&server);
    let query = vec![("status".to_string(), "open".to_string())];
    let result = client
        .list_until::<Customer>("/api/v1/repair-orders", &query, 2, 15, 10, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.items.len(), 15);
    assert_eq!(result.metadata.records_fetched, 20);
    assert_eq!(result.metadata.records_retained, 15);
    assert_eq!(result.metadata.pages_traversed, 2);
}

#[tokio::test]
async fn test_list_until_zero_limit_fetches_nothing() {
    let server = MockServer::start().await;
    mount_token(&server, "2", 0).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/repair-orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&ids(0..10), 0, true)))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server)
        .list_until::<Customer>("/api/v1/repair-orders", &[], 2, 0, 10, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.items.is_empty());
    assert_eq!(result.metadata.pages_traversed, 0);
    assert_eq!(result.metadata.records_fetched, 0);
}

#[tokio::test]
async fn test_list_all_failure_mid_way_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, "2", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/vehicles"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&ids(0..10), 0, false)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/vehicles"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad page"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client
        .list_all::<Customer>("/api/v1/vehicles", &[], 2, 10, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Aggregation {
            stage,
            metadata,
            source,
        } => {
            assert_eq!(stage, AggregationStage::Fetch);
            assert_eq!(metadata.pages_traversed, 1);
            assert_eq!(metadata.records_fetched, 10);
            assert_eq!(source.status(), Some(400));
        }
        other => panic!("Expected aggregation error, got {other:?}"),
    }
}
