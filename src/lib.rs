//! # Cloudflare Graph Collector
//!
//! Collects accounts, account members, account roles, DNS zones, DNS records and
//! Access identity providers from the Cloudflare v4 REST API and assembles them
//! into a graph of typed entities and relationships.
//!
//! ## Features
//!
//! - **Resilient fetching**: every request goes through a bounded retry loop with
//!   exponential backoff and jitter; failures are classified before any retry decision
//! - **Lazy pagination**: paginated endpoints are exposed as single-pass streams that
//!   request page N+1 only after page N has been consumed
//! - **Graph assembly**: converters turn typed payloads into entities, shared roles are
//!   deduplicated per run, and relationships are emitted by key
//! - **Partial-failure tolerance**: identity-provider configuration that the token is
//!   not allowed to read is reported as a warning instead of aborting the run
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudflare_graph_collector::collector::ResourceCollector;
//! use cloudflare_graph_collector::config::Credential;
//! use cloudflare_graph_collector::fetcher::client::ServicesClient;
//! use cloudflare_graph_collector::graph::sink::MemorySink;
//! use cloudflare_graph_collector::pipeline::GraphPipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ServicesClient::new(Credential::new("api-token")?)?;
//! let sink = Arc::new(MemorySink::new());
//! let pipeline = GraphPipeline::new(ResourceCollector::new(client), sink.clone());
//!
//! let report = pipeline.run().await?;
//! println!("collected {} entities", report.total_entities());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Control flows top to bottom, items flow back up:
//!
//! - [`pipeline`] - walks the account and zone hierarchies and feeds the sink
//! - [`collector`] - one stream per logical resource, plus the credential probe
//! - [`fetcher`] - page iterator, retrying client, error classifier and transport
//! - [`graph`] - entities, relationships, converters, dedup set and sinks
//! - [`config`] - credential, retry policy and API constants

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Deserializer, Serialize};

/// CLI command implementations
pub mod cli;

/// Resource-level collection on top of the paginated client
pub mod collector;

/// Credential, retry policy and API constants
pub mod config;

/// HTTP transport, classification, retries and pagination
pub mod fetcher;

/// Entity/relationship model, converters and sinks
pub mod graph;

/// Metrics for requests, retries and graph emission
pub mod metrics;

/// Hierarchy walk that assembles the graph
pub mod pipeline;

/// Cancellation coordination shared across tasks
pub mod shutdown;

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, V>(deserializer: D) -> Result<V, D::Error>
where
    D: Deserializer<'de>,
    V: Default + Deserialize<'de>,
{
    Ok(Option::<V>::deserialize(deserializer)?.unwrap_or_default())
}

/// Envelope returned by every Cloudflare v4 list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    /// Whether the provider considers the call successful
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    /// Provider error objects, if any
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<serde_json::Value>,
    /// Provider informational messages
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<serde_json::Value>,
    /// Items of this page; `null` or missing is treated like an empty page
    pub result: Option<Vec<T>>,
    /// Pagination metadata
    #[serde(default)]
    pub result_info: Option<ResultInfo>,
}

impl<T> ApiResponse<T> {
    /// Total page count reported by this response; unknown counts as zero.
    pub fn total_pages(&self) -> u32 {
        self.result_info
            .as_ref()
            .and_then(|info| info.total_pages)
            .unwrap_or(0)
    }

    /// Number of items carried by this page.
    pub fn item_count(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }
}

/// Pagination metadata (`result_info`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultInfo {
    /// Current page (1-based)
    pub page: Option<u32>,
    /// Requested page size
    pub per_page: Option<u32>,
    /// Items on this page
    pub count: Option<u32>,
    /// Items across all pages
    pub total_count: Option<u64>,
    /// Pages across the whole collection
    pub total_pages: Option<u32>,
}

/// Cloudflare account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    /// Account identifier
    pub id: String,
    /// Account name
    #[serde(default)]
    pub name: Option<String>,
    /// Account type (`standard`, `enterprise`)
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    /// Account settings
    #[serde(default)]
    pub settings: Option<AccountSettings>,
    /// Creation timestamp (RFC 3339)
    #[serde(default)]
    pub created_on: Option<String>,
}

/// Account-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountSettings {
    /// Whether members must use two-factor authentication
    #[serde(default)]
    pub enforce_twofactor: Option<bool>,
    /// Expiry of Access approvals
    #[serde(default)]
    pub access_approval_expiry: Option<String>,
}

/// Membership of a user in an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountMember {
    /// Membership identifier
    pub id: String,
    /// Member's user record
    #[serde(default)]
    pub user: Option<MemberUser>,
    /// Invitation status (`accepted`, `pending`, `rejected`)
    #[serde(default)]
    pub status: Option<String>,
    /// Roles granted through this membership
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<MemberRole>,
    /// Whether API access is enabled for the member
    #[serde(default)]
    pub api_access_enabled: Option<bool>,
}

impl AccountMember {
    /// Role ids referenced by this membership, without duplicates, in order.
    pub fn role_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.roles.len());
        for id in self.roles.iter().filter_map(|role| role.id.as_deref()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// User details embedded in a membership
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemberUser {
    /// User identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Email address
    #[serde(default)]
    pub email: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether the user has 2FA enabled
    #[serde(default)]
    pub two_factor_authentication_enabled: Option<bool>,
}

/// Role reference embedded in a membership
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemberRole {
    /// Role identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Role name
    #[serde(default)]
    pub name: Option<String>,
    /// Role description
    #[serde(default)]
    pub description: Option<String>,
}

/// Role defined for an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRole {
    /// Role identifier
    pub id: String,
    /// Role name
    #[serde(default)]
    pub name: Option<String>,
    /// Role description
    #[serde(default)]
    pub description: Option<String>,
}

/// DNS zone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    /// Zone identifier
    pub id: String,
    /// Domain name
    #[serde(default)]
    pub name: Option<String>,
    /// Zone status (`active`, `pending`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Whether the zone is paused
    #[serde(default)]
    pub paused: Option<bool>,
    /// Setup type (`full`, `partial`)
    #[serde(rename = "type", default)]
    pub zone_type: Option<String>,
    /// Development mode remaining seconds
    #[serde(default)]
    pub development_mode: Option<i64>,
    /// Cloudflare name servers assigned to the zone
    #[serde(default, deserialize_with = "null_as_default")]
    pub name_servers: Vec<String>,
    /// Name servers before moving to Cloudflare
    #[serde(default)]
    pub original_name_servers: Option<Vec<String>>,
    /// Owner of the zone
    #[serde(default)]
    pub owner: Option<ZoneOwner>,
    /// Account the zone belongs to
    #[serde(default)]
    pub account: Option<ZoneAccount>,
    /// Activation timestamp (RFC 3339)
    #[serde(default)]
    pub activated_on: Option<String>,
    /// Creation timestamp (RFC 3339)
    #[serde(default)]
    pub created_on: Option<String>,
    /// Last modification timestamp (RFC 3339)
    #[serde(default)]
    pub modified_on: Option<String>,
}

/// Zone owner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneOwner {
    /// Owner identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Owner type (`user`, `organization`)
    #[serde(rename = "type", default)]
    pub owner_type: Option<String>,
    /// Owner email
    #[serde(default)]
    pub email: Option<String>,
}

/// Account reference embedded in a zone
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneAccount {
    /// Account identifier
    #[serde(default)]
    pub id: Option<String>,
    /// Account name
    #[serde(default)]
    pub name: Option<String>,
}

/// DNS record within a zone
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsRecord {
    /// Record identifier
    pub id: String,
    /// Owning zone identifier
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Owning zone name
    #[serde(default)]
    pub zone_name: Option<String>,
    /// Record name
    #[serde(default)]
    pub name: Option<String>,
    /// Record type (`A`, `CNAME`, `MX`, ...)
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    /// Record content
    #[serde(default)]
    pub content: Option<String>,
    /// Whether the record can be proxied
    #[serde(default)]
    pub proxiable: Option<bool>,
    /// Whether the record is proxied
    #[serde(default)]
    pub proxied: Option<bool>,
    /// Time to live in seconds (1 = automatic)
    #[serde(default)]
    pub ttl: Option<u32>,
    /// Whether the record is locked
    #[serde(default)]
    pub locked: Option<bool>,
    /// Creation timestamp (RFC 3339)
    #[serde(default)]
    pub created_on: Option<String>,
    /// Last modification timestamp (RFC 3339)
    #[serde(default)]
    pub modified_on: Option<String>,
}

/// Access identity provider configured on an account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityProvider {
    /// Provider identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Provider type (`okta`, `azureAD`, `onelogin`, `github`, ...)
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Provider-specific configuration
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: IdentityProviderConfig,
}

/// Subset of identity-provider configuration used for mapping
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityProviderConfig {
    /// OAuth/OIDC client id registered with the external system
    #[serde(default)]
    pub client_id: Option<String>,
    /// Okta organization (e.g. `dev-123.okta.com`)
    #[serde(default)]
    pub okta_account: Option<String>,
    /// Azure AD directory (tenant) id
    #[serde(default)]
    pub directory_id: Option<String>,
    /// OneLogin account
    #[serde(default)]
    pub onelogin_account: Option<String>,
}
