//! Real HTTP round trips through reqwest against a mock Cloudflare API

use cloudflare_graph_collector::collector::ResourceCollector;
use cloudflare_graph_collector::config::{Credential, RetryPolicy};
use cloudflare_graph_collector::fetcher::{FetcherError, ReqwestTransport, ServicesClient};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Client with a connection pool private to the current test runtime
fn client_at(base_url: String, max_attempts: u32) -> ServicesClient {
    let transport = ReqwestTransport::with_client(Arc::new(reqwest::Client::new()));
    ServicesClient::with_transport(transport, Credential::new("test-token").unwrap())
        .with_base_url(base_url)
        .with_retry_policy(RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(5),
            backoff_factor: 1.0,
            jitter: false,
        })
        .unwrap()
}

fn client(server: &MockServer, max_attempts: u32) -> ServicesClient {
    client_at(format!("{}/client/v4", server.uri()), max_attempts)
}

fn page(ids: &[&str], page: u32, total_pages: u32) -> serde_json::Value {
    let result: Vec<_> = ids.iter().map(|id| json!({"id": id, "name": format!("{id}.com")})).collect();
    json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": result,
        "result_info": {"page": page, "per_page": 500, "count": ids.len(), "total_count": 3, "total_pages": total_pages}
    })
}

/// Fails with 500 for the first `failures` requests, then succeeds
struct FlakyResponder {
    calls: Arc<AtomicU32>,
    failures: u32,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            ResponseTemplate::new(500).set_body_string("internal error")
        } else {
            ResponseTemplate::new(200).set_body_json(page(&["z1"], 1, 1))
        }
    }
}

#[tokio::test]
async fn test_paginates_over_http_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(query_param("page", "1"))
        .and(query_param("per_page", "500"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["z1", "z2"], 1, 2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["z3"], 2, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let collector = ResourceCollector::new(client(&server, 3));
    let zones: Vec<_> = collector.iterate_zones().try_collect().await.unwrap();

    let ids: Vec<_> = zones.iter().map(|z| z.id.as_str()).collect();
    assert_eq!(ids, vec!["z1", "z2", "z3"]);
    assert_eq!(zones[0].name.as_deref(), Some("z1.com"));
}

#[tokio::test]
async fn test_server_error_then_success() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(FlakyResponder {
            calls: calls.clone(),
            failures: 1,
        })
        .mount(&server)
        .await;

    let collector = ResourceCollector::new(client(&server, 3));
    let zones: Vec<_> = collector.iterate_zones().try_collect().await.unwrap();

    assert_eq!(zones.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_attempts() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));
    Mock::given(method("GET"))
        .and(path("/client/v4/zones"))
        .respond_with(FlakyResponder {
            calls: calls.clone(),
            failures: u32::MAX,
        })
        .mount(&server)
        .await;

    let collector = ResourceCollector::new(client(&server, 3));
    let err = collector
        .iterate_zones()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(err.status(), Some(500));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "errors": [{"code": 10000, "message": "Authentication error"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let collector = ResourceCollector::new(client(&server, 5));
    let err = collector.validate_credentials().await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(err.attempts(), 1);
}

#[tokio::test]
async fn test_identity_providers_forbidden_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/client/v4/accounts/a1/access/identity_providers"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let collector = ResourceCollector::new(client(&server, 5));
    let providers = collector.iterate_identity_providers("a1").await.unwrap();

    assert!(providers.items.is_empty());
    assert!(providers.warning.is_some());
}

#[tokio::test]
async fn test_connection_refused_is_fatal() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_at(format!("http://{addr}/client/v4"), 3);

    let err = ResourceCollector::new(client)
        .validate_credentials()
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Aborted { attempts: 1, .. }));
}
