//! One operation per Cloudflare resource
//!
//! Thin wrappers over the page iterator that fix the endpoint templates. Only
//! identity providers get special treatment: an account without Access (or a
//! token without Access read permission) answers 403, and that must not end
//! the collection run.

use futures::StreamExt;
use serde::de::IgnoredAny;
use std::fmt;
use tracing::{debug, warn};

use crate::fetcher::client::ServicesClient;
use crate::fetcher::transport::{ReqwestTransport, Transport};
use crate::fetcher::{FetcherResult, ItemStream};
use crate::{Account, AccountMember, AccountRole, DnsRecord, IdentityProvider, Zone};

/// Non-fatal condition noticed during collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorWarning {
    /// Identity providers could not be read for this account (403)
    IdentityProvidersUnavailable {
        /// Account whose identity providers were skipped
        account_id: String,
    },
    /// A role key was already emitted for another account in this run
    RoleKeyCollision {
        /// Entity key of the role
        key: String,
        /// Account that referenced the role again
        account_id: String,
    },
    /// Identity provider of a known type without a client id to match on
    UnmappedIdentityProvider {
        /// Account owning the provider
        account_id: String,
        /// Provider identifier
        provider_id: String,
        /// Provider type
        provider_type: String,
    },
}

impl fmt::Display for CollectorWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorWarning::IdentityProvidersUnavailable { account_id } => write!(
                f,
                "identity providers unavailable for account {account_id} (token lacks Access read permission)"
            ),
            CollectorWarning::RoleKeyCollision { key, account_id } => write!(
                f,
                "role {key} already collected from another account (seen again in account {account_id})"
            ),
            CollectorWarning::UnmappedIdentityProvider {
                account_id,
                provider_id,
                provider_type,
            } => write!(
                f,
                "{provider_type} identity provider {provider_id} in account {account_id} has no client id"
            ),
        }
    }
}

/// Items of an optional sub-resource plus the warning raised if it was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalResource<T> {
    /// Items collected; empty when the resource was unavailable
    pub items: Vec<T>,
    /// Set when the resource was unavailable
    pub warning: Option<CollectorWarning>,
}

/// Resource-level access to the Cloudflare API
pub struct ResourceCollector<T: Transport = ReqwestTransport> {
    client: ServicesClient<T>,
}

impl<T: Transport> ResourceCollector<T> {
    /// Wrap a configured client.
    pub fn new(client: ServicesClient<T>) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &ServicesClient<T> {
        &self.client
    }

    /// Accounts visible to the token
    pub fn iterate_accounts(&self) -> ItemStream<'_, Account> {
        self.client.items("accounts")
    }

    /// Members of an account
    pub fn iterate_account_members(&self, account_id: &str) -> ItemStream<'_, AccountMember> {
        self.client.items(format!("accounts/{account_id}/members"))
    }

    /// Roles defined for an account
    pub fn iterate_account_roles(&self, account_id: &str) -> ItemStream<'_, AccountRole> {
        self.client.items(format!("accounts/{account_id}/roles"))
    }

    /// Zones visible to the token
    pub fn iterate_zones(&self) -> ItemStream<'_, Zone> {
        self.client.items("zones")
    }

    /// DNS records of a zone
    pub fn iterate_zone_records(&self, zone_id: &str) -> ItemStream<'_, DnsRecord> {
        self.client.items(format!("zones/{zone_id}/dns_records"))
    }

    /// Access identity providers of an account.
    ///
    /// A 403 becomes [`CollectorWarning::IdentityProvidersUnavailable`] with no
    /// items. Every other failure is returned as is.
    pub async fn iterate_identity_providers(
        &self,
        account_id: &str,
    ) -> FetcherResult<OptionalResource<IdentityProvider>> {
        let mut providers = self
            .client
            .items::<IdentityProvider>(format!("accounts/{account_id}/access/identity_providers"));
        let mut items = Vec::new();

        while let Some(provider) = providers.next().await {
            match provider {
                Ok(provider) => items.push(provider),
                Err(e) if e.is_authorization() => {
                    let warning = CollectorWarning::IdentityProvidersUnavailable {
                        account_id: account_id.to_string(),
                    };
                    warn!(account_id, "{}", warning);
                    return Ok(OptionalResource {
                        items: Vec::new(),
                        warning: Some(warning),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        debug!(account_id, count = items.len(), "Collected identity providers");
        Ok(OptionalResource {
            items,
            warning: None,
        })
    }

    /// Cheap probe: page 1 of `accounts` with one item per page.
    ///
    /// Returns the provider's `success` flag. Transport and classification
    /// errors propagate, so a revoked token surfaces as an authentication error.
    pub async fn validate_credentials(&self) -> FetcherResult<bool> {
        let response = self.client.fetch_page::<IgnoredAny>("accounts", 1, 1).await?;
        Ok(response.success)
    }
}

impl<T: Transport> From<ServicesClient<T>> for ResourceCollector<T> {
    fn from(client: ServicesClient<T>) -> Self {
        Self::new(client)
    }
}
