//! Shared test doubles: scripted and route-based transports

#![allow(dead_code)]

use async_trait::async_trait;
use cloudflare_graph_collector::config::{Credential, RetryPolicy, BASE_URL};
use cloudflare_graph_collector::fetcher::{
    FailureHint, HttpRequest, RawResponse, ServicesClient, Transport, TransportFailure,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cloudflare list envelope for one page
pub fn envelope(items: Vec<Value>, page: u32, per_page: u32, total_pages: Option<u32>) -> Value {
    let count = items.len();
    let mut body = json!({
        "success": true,
        "errors": [],
        "messages": [],
        "result": items,
    });
    if let Some(total_pages) = total_pages {
        body["result_info"] = json!({
            "page": page,
            "per_page": per_page,
            "count": count,
            "total_count": count,
            "total_pages": total_pages,
        });
    }
    body
}

/// 200 response carrying a JSON body
pub fn ok(body: Value) -> Result<RawResponse, TransportFailure> {
    Ok(RawResponse::new(200, body.to_string()))
}

/// Response with the given status
pub fn status(code: u16) -> Result<RawResponse, TransportFailure> {
    Ok(RawResponse::new(code, format!("{{\"success\":false,\"status\":{code}}}")))
}

/// Connection reset before any response
pub fn reset() -> Result<RawResponse, TransportFailure> {
    Err(TransportFailure::new(
        FailureHint::ConnectionReset,
        "read ECONNRESET",
    ))
}

/// Retry policy without meaningful delays
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        backoff_factor: 1.0,
        jitter: false,
    }
}

/// Client over `transport` with a fast retry policy
pub fn client_for<T: Transport>(transport: T, max_attempts: u32) -> ServicesClient<T> {
    ServicesClient::with_transport(transport, Credential::new("test-token").unwrap())
        .with_retry_policy(fast_policy(max_attempts))
        .unwrap()
}

/// Path relative to the API root and the `page` / `per_page` query values
pub fn split_url(url: &str) -> (String, u32, u32) {
    let relative = url.strip_prefix(BASE_URL).unwrap_or(url);
    let (path, query) = relative.split_once('?').unwrap_or((relative, ""));

    let mut page = 1;
    let mut per_page = 0;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("page", value)) => page = value.parse().unwrap(),
            Some(("per_page", value)) => per_page = value.parse().unwrap(),
            _ => {}
        }
    }
    (path.to_string(), page, per_page)
}

/// Replays a fixed sequence of outcomes and records every request
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<RawResponse, TransportFailure>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<RawResponse, TransportFailure>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportFailure::new(FailureHint::Other, "script exhausted")))
    }
}

enum Route {
    Collection(Vec<Value>),
    Status(u16),
}

/// In-memory Cloudflare API keyed by path
///
/// Collections are paginated according to the requested `per_page`. Paths
/// without a route answer with an empty collection.
#[derive(Default)]
pub struct FakeApi {
    routes: Mutex<HashMap<String, Route>>,
    one_shot: Mutex<HashMap<String, VecDeque<Result<RawResponse, TransportFailure>>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `items` at `path`
    pub fn collection(self: &Arc<Self>, path: &str, items: Vec<Value>) -> Arc<Self> {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Collection(items));
        self.clone()
    }

    /// Always answer `path` with `code`
    pub fn fail_with(self: &Arc<Self>, path: &str, code: u16) -> Arc<Self> {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), Route::Status(code));
        self.clone()
    }

    /// Answer the next request to `path` with `reply`, then fall back to the route
    pub fn once(self: &Arc<Self>, path: &str, reply: Result<RawResponse, TransportFailure>) -> Arc<Self> {
        self.one_shot
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self.clone()
    }

    /// Paths requested so far, with page numbers, in order
    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests made to `path`
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.split('#').next() == Some(path))
            .count()
    }
}

#[async_trait]
impl Transport for FakeApi {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportFailure> {
        let (path, page, per_page) = split_url(&request.url);
        self.requests
            .lock()
            .unwrap()
            .push(format!("{path}#{page}"));

        if let Some(reply) = self
            .one_shot
            .lock()
            .unwrap()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        let routes = self.routes.lock().unwrap();
        match routes.get(&path) {
            Some(Route::Status(code)) => status(*code),
            Some(Route::Collection(items)) => {
                let per_page = per_page.max(1) as usize;
                let total_pages = items.len().div_ceil(per_page) as u32;
                let start = (page as usize - 1) * per_page;
                let page_items: Vec<Value> =
                    items.iter().skip(start).take(per_page).cloned().collect();
                ok(envelope(page_items, page, per_page as u32, Some(total_pages)))
            }
            None => ok(envelope(Vec::new(), page, per_page, Some(0))),
        }
    }
}
