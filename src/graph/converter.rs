//! Converters from provider payloads to graph entities
//!
//! Every converter is total: missing optional fields simply leave the matching
//! property unset. Timestamps become epoch milliseconds; unparseable ones are
//! dropped.

use chrono::DateTime;

use crate::graph::{Entity, EntityKind, MappedRelationship};
use crate::{Account, AccountMember, AccountRole, DnsRecord, IdentityProvider, Zone};

/// RFC 3339 timestamp to epoch milliseconds
pub fn parse_timestamp_millis(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.timestamp_millis())
}

/// Account entity
pub fn convert_account(account: &Account) -> Entity {
    let enforce_twofactor = account
        .settings
        .as_ref()
        .and_then(|s| s.enforce_twofactor);

    Entity::new(EntityKind::Account, &account.id)
        .with("accountId", account.id.as_str())
        .with_opt("name", account.name.as_deref())
        .with_opt("displayName", account.name.as_deref())
        .with_opt("type", account.account_type.as_deref())
        .with_opt("mfaEnabled", enforce_twofactor.filter(|enforced| *enforced))
        .with_opt("mfaEnforced", enforce_twofactor)
        .with_opt(
            "accessApprovalExpiry",
            account
                .settings
                .as_ref()
                .and_then(|s| s.access_approval_expiry.as_deref()),
        )
        .with_opt("createdOn", parse_timestamp_millis(account.created_on.as_deref()))
}

/// Member entity, keyed by membership id
pub fn convert_account_member(member: &AccountMember) -> Entity {
    let user = member.user.clone().unwrap_or_default();
    let role_names: Vec<String> = member
        .roles
        .iter()
        .filter_map(|role| role.name.as_deref())
        .map(str::to_lowercase)
        .collect();
    let name = match (user.first_name.as_deref(), user.last_name.as_deref()) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        _ => String::new(),
    };
    let roles: Vec<String> = member.role_ids().into_iter().map(str::to_string).collect();

    Entity::new(EntityKind::Member, &member.id)
        .with("id", user.id.as_deref().unwrap_or(&member.id))
        .with_opt("userId", user.id.as_deref())
        .with("membershipId", member.id.as_str())
        .with_opt("firstName", user.first_name.as_deref())
        .with_opt("lastName", user.last_name.as_deref())
        .with("name", name)
        .with_opt("username", user.email.as_deref())
        .with_opt("email", user.email.as_deref())
        .with_opt("displayName", user.email.as_deref())
        .with_opt("mfaEnabled", user.two_factor_authentication_enabled)
        .with_opt("status", member.status.as_deref())
        .with("active", member.status.as_deref() == Some("accepted"))
        .with("roles", roles)
        .with("admin", role_names.iter().any(|n| n.contains("administrator")))
        .with("superAdmin", role_names.iter().any(|n| n.contains("super admin")))
}

/// Role entity
pub fn convert_account_role(role: &AccountRole) -> Entity {
    Entity::new(EntityKind::Role, &role.id)
        .with("roleId", role.id.as_str())
        .with_opt("name", role.name.as_deref())
        .with_opt("displayName", role.name.as_deref())
        .with_opt("description", role.description.as_deref())
}

/// Zone entity
pub fn convert_zone(zone: &Zone) -> Entity {
    let owner = zone.owner.clone().unwrap_or_default();
    let account = zone.account.clone().unwrap_or_default();

    Entity::new(EntityKind::Zone, &zone.id)
        .with_opt("name", zone.name.as_deref())
        .with_opt("displayName", zone.name.as_deref())
        .with_opt("domainName", zone.name.as_deref())
        .with_opt("status", zone.status.as_deref())
        .with("active", zone.status.as_deref() == Some("active"))
        .with_opt("paused", zone.paused)
        .with_opt("type", zone.zone_type.as_deref())
        .with_opt("developmentMode", zone.development_mode)
        .with("nameServers", zone.name_servers.clone())
        .with_opt("originalNameServers", zone.original_name_servers.clone())
        .with_opt("ownerId", owner.id)
        .with_opt("ownerType", owner.owner_type)
        .with_opt("ownerEmail", owner.email)
        .with_opt("accountId", account.id)
        .with_opt("accountName", account.name)
        .with_opt("activatedOn", parse_timestamp_millis(zone.activated_on.as_deref()))
        .with_opt("createdOn", parse_timestamp_millis(zone.created_on.as_deref()))
        .with_opt("modifiedOn", parse_timestamp_millis(zone.modified_on.as_deref()))
}

/// DNS record entity
pub fn convert_record(record: &DnsRecord) -> Entity {
    Entity::new(EntityKind::Record, &record.id)
        .with_opt("name", record.name.as_deref())
        .with_opt("displayName", record.name.as_deref())
        .with_opt("recordType", record.record_type.as_deref())
        .with_opt("value", record.content.as_deref())
        .with("TTL", record.ttl.unwrap_or(0))
        .with_opt("proxiable", record.proxiable)
        .with_opt("proxied", record.proxied)
        .with_opt("locked", record.locked)
        .with_opt("zoneId", record.zone_id.as_deref())
        .with_opt("zoneName", record.zone_name.as_deref())
        .with_opt("createdOn", parse_timestamp_millis(record.created_on.as_deref()))
        .with_opt("modifiedOn", parse_timestamp_millis(record.modified_on.as_deref()))
}

/// Entity type of the external application an identity-provider type trusts
pub fn external_application_type(provider_type: &str) -> Option<&'static str> {
    match provider_type {
        "okta" => Some("okta_application"),
        "azureAD" => Some("azure_application"),
        "onelogin" => Some("onelogin_application"),
        _ => None,
    }
}

/// What to do with one identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProviderMapping {
    /// Emit this mapped relationship
    Mapped(MappedRelationship),
    /// Provider type has no external counterpart
    UnknownType,
    /// Known type, but no client id to match the external application on
    MissingClientId,
}

/// Map an identity provider to `Account TRUSTS <external application>`.
pub fn map_identity_provider(account_key: &str, provider: &IdentityProvider) -> IdentityProviderMapping {
    let Some(target_type) = external_application_type(&provider.provider_type) else {
        return IdentityProviderMapping::UnknownType;
    };

    match provider.config.client_id.as_deref().filter(|id| !id.is_empty()) {
        Some(client_id) => IdentityProviderMapping::Mapped(MappedRelationship::trusts(
            account_key,
            EntityKind::Account.type_name(),
            target_type,
            client_id,
        )),
        None => IdentityProviderMapping::MissingClientId,
    }
}
