//! Resource collector endpoints, optional identity providers and the credential probe

use cloudflare_graph_collector::collector::{CollectorWarning, ResourceCollector};
use cloudflare_graph_collector::fetcher::FetcherError;
use futures::TryStreamExt;
use serde_json::json;

use crate::support::{client_for, envelope, ok, split_url, status, FakeApi, ScriptedTransport};

#[tokio::test]
async fn test_endpoint_templates() {
    let api = FakeApi::new();
    let collector = ResourceCollector::new(client_for(api.clone(), 1));

    let _ = collector.iterate_accounts().try_collect::<Vec<_>>().await.unwrap();
    let _ = collector.iterate_account_members("a1").try_collect::<Vec<_>>().await.unwrap();
    let _ = collector.iterate_account_roles("a1").try_collect::<Vec<_>>().await.unwrap();
    let _ = collector.iterate_zones().try_collect::<Vec<_>>().await.unwrap();
    let _ = collector.iterate_zone_records("z1").try_collect::<Vec<_>>().await.unwrap();
    collector.iterate_identity_providers("a1").await.unwrap();

    assert_eq!(
        api.requested(),
        vec![
            "accounts#1",
            "accounts/a1/members#1",
            "accounts/a1/roles#1",
            "zones#1",
            "zones/z1/dns_records#1",
            "accounts/a1/access/identity_providers#1",
        ]
    );
}

#[tokio::test]
async fn test_typed_items_are_decoded() {
    let api = FakeApi::new().collection(
        "accounts/a1/members",
        vec![json!({
            "id": "m1",
            "status": "accepted",
            "user": {"id": "u1", "email": "ada@example.com"},
            "roles": [{"id": "r1", "name": "Administrator"}]
        })],
    );
    let collector = ResourceCollector::new(client_for(api, 1));

    let members: Vec<_> = collector
        .iterate_account_members("a1")
        .try_collect()
        .await
        .unwrap();

    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, "m1");
    assert_eq!(members[0].role_ids(), vec!["r1"]);
}

#[tokio::test]
async fn test_identity_provider_403_becomes_warning() {
    let api = FakeApi::new().fail_with("accounts/a1/access/identity_providers", 403);
    let collector = ResourceCollector::new(client_for(api.clone(), 5));

    let providers = collector.iterate_identity_providers("a1").await.unwrap();

    assert!(providers.items.is_empty());
    assert_eq!(
        providers.warning,
        Some(CollectorWarning::IdentityProvidersUnavailable {
            account_id: "a1".to_string()
        })
    );
    assert_eq!(api.hits("accounts/a1/access/identity_providers"), 1);
}

#[tokio::test]
async fn test_identity_provider_other_failures_propagate() {
    let api = FakeApi::new().fail_with("accounts/a1/access/identity_providers", 500);
    let collector = ResourceCollector::new(client_for(api.clone(), 2));

    let err = collector.iterate_identity_providers("a1").await.unwrap_err();

    assert!(matches!(err, FetcherError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(api.hits("accounts/a1/access/identity_providers"), 2);
}

#[tokio::test]
async fn test_other_endpoints_do_not_absorb_403() {
    let api = FakeApi::new().fail_with("accounts/a1/roles", 403);
    let collector = ResourceCollector::new(client_for(api, 5));

    let err = collector
        .iterate_account_roles("a1")
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    assert!(err.is_authorization());
}

#[tokio::test]
async fn test_identity_providers_are_decoded() {
    let api = FakeApi::new().collection(
        "accounts/a1/access/identity_providers",
        vec![json!({
            "id": "idp1",
            "name": "Okta",
            "type": "okta",
            "config": {"client_id": "0oa123", "okta_account": "dev-1.okta.com"}
        })],
    );
    let collector = ResourceCollector::new(client_for(api, 1));

    let providers = collector.iterate_identity_providers("a1").await.unwrap();

    assert!(providers.warning.is_none());
    assert_eq!(providers.items.len(), 1);
    assert_eq!(providers.items[0].provider_type, "okta");
    assert_eq!(providers.items[0].config.client_id.as_deref(), Some("0oa123"));
}

#[tokio::test]
async fn test_validate_credentials_probe() {
    let transport = ScriptedTransport::new(vec![ok(envelope(vec![json!({"id": "a1"})], 1, 1, Some(3)))]);
    let collector = ResourceCollector::new(client_for(transport.clone(), 1));

    assert!(collector.validate_credentials().await.unwrap());

    let (path, page, per_page) = split_url(&transport.urls()[0]);
    assert_eq!((path.as_str(), page, per_page), ("accounts", 1, 1));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_validate_credentials_reports_unsuccessful_response() {
    let transport = ScriptedTransport::new(vec![ok(json!({"success": false, "result": null}))]);
    let collector = ResourceCollector::new(client_for(transport, 1));

    assert!(!collector.validate_credentials().await.unwrap());
}

#[tokio::test]
async fn test_validate_credentials_with_revoked_token() {
    let transport = ScriptedTransport::new(vec![status(401)]);
    let collector = ResourceCollector::new(client_for(transport.clone(), 5));

    let err = collector.validate_credentials().await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(transport.calls(), 1);
}
