//! Page iterator: ordering, termination and laziness

use cloudflare_graph_collector::fetcher::FetcherError;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::support::{client_for, envelope, ok, status, ScriptedTransport};

fn items(ids: &[&str]) -> Vec<Value> {
    ids.iter().map(|id| json!({ "id": id })).collect()
}

async fn drain(
    transport: std::sync::Arc<ScriptedTransport>,
) -> Vec<Result<String, FetcherError>> {
    let client = client_for(transport, 2);
    let results: Vec<Result<String, FetcherError>> = client
        .items::<Value>("zones")
        .map(|item| item.map(|v| v["id"].as_str().unwrap().to_string()))
        .collect()
        .await;
    results
}

#[tokio::test]
async fn test_two_pages_deliver_three_items_in_order() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a", "b"]), 1, 2, Some(2))),
        ok(envelope(items(&["c"]), 2, 2, Some(2))),
    ]);

    let ids: Vec<String> = drain(transport.clone())
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(transport.calls(), 2);

    let urls = transport.urls();
    assert!(urls[0].ends_with("zones?page=1&per_page=500"));
    assert!(urls[1].ends_with("zones?page=2&per_page=500"));
}

#[tokio::test]
async fn test_missing_result_info_stops_after_first_page() {
    let transport = ScriptedTransport::new(vec![
        ok(json!({"success": true, "result": [{"id": "a"}, {"id": "b"}]})),
        ok(envelope(items(&["never"]), 2, 2, Some(2))),
    ]);

    let results = drain(transport.clone()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_empty_page_stops_even_if_more_pages_reported() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a"]), 1, 1, Some(5))),
        ok(envelope(Vec::new(), 2, 1, Some(5))),
        ok(envelope(items(&["never"]), 3, 1, Some(5))),
    ]);

    let results = drain(transport.clone()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_null_result_is_an_empty_page() {
    let transport = ScriptedTransport::new(vec![ok(json!({
        "success": true,
        "result": null,
        "result_info": {"page": 1, "per_page": 500, "count": 0, "total_count": 0, "total_pages": 3}
    }))]);

    let results = drain(transport.clone()).await;

    assert!(results.is_empty());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_total_pages_is_read_from_every_response() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a"]), 1, 1, Some(3))),
        ok(envelope(items(&["b"]), 2, 1, Some(2))),
        ok(envelope(items(&["never"]), 3, 1, Some(3))),
    ]);

    let results = drain(transport.clone()).await;

    assert_eq!(results.len(), 2);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_failure_on_second_page_keeps_delivered_items() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a", "b"]), 1, 2, Some(3))),
        status(500),
        status(500),
        ok(envelope(items(&["never"]), 3, 2, Some(3))),
    ]);

    let results = drain(transport.clone()).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_deref().unwrap(), "a");
    assert_eq!(results[1].as_deref().unwrap(), "b");
    assert!(matches!(
        results[2],
        Err(FetcherError::RetriesExhausted { attempts: 2, .. })
    ));
    // two attempts for page 2, page 3 never requested
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_next_page_is_requested_only_when_needed() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a", "b"]), 1, 2, Some(2))),
        ok(envelope(items(&["c"]), 2, 2, Some(2))),
    ]);
    let client = client_for(transport.clone(), 1);

    let mut stream = client.items::<Value>("zones");
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first["id"], "a");
    assert_eq!(transport.calls(), 1);

    let second = stream.next().await.unwrap().unwrap();
    assert_eq!(second["id"], "b");
    assert_eq!(transport.calls(), 1);

    let third = stream.next().await.unwrap().unwrap();
    assert_eq!(third["id"], "c");
    assert_eq!(transport.calls(), 2);

    assert!(stream.next().await.is_none());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_callback_error_stops_iteration() {
    let transport = ScriptedTransport::new(vec![
        ok(envelope(items(&["a", "b"]), 1, 2, Some(2))),
        ok(envelope(items(&["c"]), 2, 2, Some(2))),
    ]);
    let client = client_for(transport.clone(), 1);

    let mut seen = Vec::new();
    let result = client
        .for_each_item("zones", |item: Value| {
            seen.push(item["id"].as_str().unwrap().to_string());
            let stop = item["id"] == "a";
            async move {
                if stop {
                    Err(FetcherError::Configuration("stop".to_string()))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert!(matches!(result, Err(FetcherError::Configuration(_))));
    assert_eq!(seen, vec!["a"]);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_custom_page_size_is_sent() {
    let transport = ScriptedTransport::new(vec![ok(envelope(items(&["a"]), 1, 50, Some(1)))]);
    let client = client_for(transport.clone(), 1).with_page_size(50).unwrap();

    let count = client.items::<Value>("zones").count().await;

    assert_eq!(count, 1);
    assert!(transport.urls()[0].ends_with("zones?page=1&per_page=50"));
}

#[tokio::test]
async fn test_null_errors_and_messages_do_not_abort_the_walk() {
    let transport = ScriptedTransport::new(vec![ok(json!({
        "success": true,
        "errors": null,
        "messages": null,
        "result": [{"id": "1"}]
    }))]);

    let results = drain(transport.clone()).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap(), "1");
    assert_eq!(transport.calls(), 1);
}
