//! Graph model: entities, relationships and mapped relationships
//!
//! Entity keys are `<type>:<providerId>`; relationship keys are
//! `<fromKey>|<class>|<toKey>`. Both are stable across runs over unchanged
//! data, so repeated runs produce identical key sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod converter;
pub mod dedup;
pub mod sink;

pub use dedup::DedupSet;
pub use sink::{MemorySink, Sink, SinkError};

/// Property value attached to an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Boolean(bool),
    /// Integer, including epoch-millisecond timestamps
    Integer(i64),
    /// Text
    String(String),
    /// Ordered list of strings
    StringList(Vec<String>),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Integer(i64::from(value))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::StringList(value)
    }
}

/// Kinds of entity this collector produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Cloudflare account
    Account,
    /// Account membership
    Member,
    /// Account role
    Role,
    /// DNS zone
    Zone,
    /// DNS record
    Record,
}

impl EntityKind {
    /// Value of the `_type` tag
    pub fn type_name(self) -> &'static str {
        match self {
            EntityKind::Account => "cloudflare_account",
            EntityKind::Member => "cloudflare_account_member",
            EntityKind::Role => "cloudflare_account_role",
            EntityKind::Zone => "cloudflare_dns_zone",
            EntityKind::Record => "cloudflare_dns_record",
        }
    }

    /// Value of the `_class` tag
    pub fn class(self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::Member => "User",
            EntityKind::Role => "AccessRole",
            EntityKind::Zone => "DomainZone",
            EntityKind::Record => "DomainRecord",
        }
    }

    /// Entity key for a provider id
    pub fn key(self, provider_id: &str) -> String {
        format!("{}:{}", self.type_name(), provider_id)
    }
}

/// Graph node for one collected resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_type")]
    entity_type: String,
    #[serde(rename = "_class")]
    class: Vec<String>,
    #[serde(flatten)]
    properties: BTreeMap<String, PropertyValue>,
}

impl Entity {
    /// Entity of the given kind with no properties beyond `id`.
    pub fn new(kind: EntityKind, provider_id: &str) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), PropertyValue::from(provider_id));
        Self {
            key: kind.key(provider_id),
            entity_type: kind.type_name().to_string(),
            class: vec![kind.class().to_string()],
            properties,
        }
    }

    /// Set a property.
    pub fn with(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Set a property when a value is present.
    pub fn with_opt<V: Into<PropertyValue>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Unique key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Type tag
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Class tags
    pub fn class(&self) -> &[String] {
        &self.class
    }

    /// All properties
    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// One property by name
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Relationship class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipClass {
    /// Containment
    Has,
    /// Role assignment
    Assigned,
    /// Trust in an external identity system
    Trusts,
}

impl RelationshipClass {
    /// Upper-case class name
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipClass::Has => "HAS",
            RelationshipClass::Assigned => "ASSIGNED",
            RelationshipClass::Trusts => "TRUSTS",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            RelationshipClass::Has => "has",
            RelationshipClass::Assigned => "assigned",
            RelationshipClass::Trusts => "trusts",
        }
    }
}

impl fmt::Display for RelationshipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationships between entities owned by this collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Account HAS Member
    AccountHasMember,
    /// Account HAS Role
    AccountHasRole,
    /// Member ASSIGNED Role
    MemberAssignedRole,
    /// Account HAS Zone
    AccountHasZone,
    /// Zone HAS Record
    ZoneHasRecord,
}

impl RelationshipKind {
    /// Source entity kind
    pub fn from_kind(self) -> EntityKind {
        match self {
            RelationshipKind::AccountHasMember
            | RelationshipKind::AccountHasRole
            | RelationshipKind::AccountHasZone => EntityKind::Account,
            RelationshipKind::MemberAssignedRole => EntityKind::Member,
            RelationshipKind::ZoneHasRecord => EntityKind::Zone,
        }
    }

    /// Target entity kind
    pub fn to_kind(self) -> EntityKind {
        match self {
            RelationshipKind::AccountHasMember => EntityKind::Member,
            RelationshipKind::AccountHasRole | RelationshipKind::MemberAssignedRole => {
                EntityKind::Role
            }
            RelationshipKind::AccountHasZone => EntityKind::Zone,
            RelationshipKind::ZoneHasRecord => EntityKind::Record,
        }
    }

    /// Relationship class
    pub fn class(self) -> RelationshipClass {
        match self {
            RelationshipKind::MemberAssignedRole => RelationshipClass::Assigned,
            _ => RelationshipClass::Has,
        }
    }

    /// Value of the `_type` tag
    pub fn type_name(self) -> &'static str {
        match self {
            RelationshipKind::AccountHasMember => "cloudflare_account_has_member",
            RelationshipKind::AccountHasRole => "cloudflare_account_has_role",
            RelationshipKind::MemberAssignedRole => "cloudflare_account_member_assigned_role",
            RelationshipKind::AccountHasZone => "cloudflare_account_has_dns_zone",
            RelationshipKind::ZoneHasRecord => "cloudflare_dns_zone_has_record",
        }
    }
}

/// Directed edge between two entity keys
///
/// The target may be referenced by key only; it does not have to be in the
/// sink when the edge is added.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_type")]
    relationship_type: String,
    #[serde(rename = "_class")]
    class: RelationshipClass,
    from_key: String,
    from_type: String,
    to_key: String,
    to_type: String,
}

impl Relationship {
    /// Edge of the given kind between two entity keys.
    pub fn new(kind: RelationshipKind, from_key: impl Into<String>, to_key: impl Into<String>) -> Self {
        let from_key = from_key.into();
        let to_key = to_key.into();
        let class = kind.class();
        Self {
            key: format!("{from_key}|{}|{to_key}", class.verb()),
            relationship_type: kind.type_name().to_string(),
            class,
            from_key,
            from_type: kind.from_kind().type_name().to_string(),
            to_key,
            to_type: kind.to_kind().type_name().to_string(),
        }
    }

    /// Unique key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Type tag
    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    /// Relationship class
    pub fn class(&self) -> RelationshipClass {
        self.class
    }

    /// Source entity key
    pub fn from_key(&self) -> &str {
        &self.from_key
    }

    /// Source entity type
    pub fn from_type(&self) -> &str {
        &self.from_type
    }

    /// Target entity key
    pub fn to_key(&self) -> &str {
        &self.to_key
    }

    /// Target entity type
    pub fn to_type(&self) -> &str {
        &self.to_type
    }
}

/// Direction of a mapped relationship relative to its source entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipDirection {
    /// Source points at the target
    Forward,
    /// Target points at the source
    Reverse,
}

/// Edge to an entity owned by another system, matched by properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedRelationship {
    #[serde(rename = "_key")]
    key: String,
    #[serde(rename = "_type")]
    relationship_type: String,
    #[serde(rename = "_class")]
    class: RelationshipClass,
    source_entity_key: String,
    relationship_direction: RelationshipDirection,
    target_filter_keys: Vec<Vec<String>>,
    target_entity: BTreeMap<String, PropertyValue>,
    skip_target_creation: bool,
}

impl MappedRelationship {
    /// `source TRUSTS <target_type>` where the target is matched by `_type` and `id`.
    ///
    /// The target is never created by this collector.
    pub fn trusts(source_entity_key: &str, source_type: &str, target_type: &str, target_id: &str) -> Self {
        let mut target_entity = BTreeMap::new();
        target_entity.insert("_type".to_string(), PropertyValue::from(target_type));
        target_entity.insert("id".to_string(), PropertyValue::from(target_id));

        let class = RelationshipClass::Trusts;
        Self {
            key: format!("{source_entity_key}|{}|{target_type}:{target_id}", class.verb()),
            relationship_type: format!("{source_type}_{}_{target_type}", class.verb()),
            class,
            source_entity_key: source_entity_key.to_string(),
            relationship_direction: RelationshipDirection::Forward,
            target_filter_keys: vec![vec!["_type".to_string(), "id".to_string()]],
            target_entity,
            skip_target_creation: true,
        }
    }

    /// Unique key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Type tag
    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    /// Relationship class
    pub fn class(&self) -> RelationshipClass {
        self.class
    }

    /// Key of the entity owned by this collector
    pub fn source_entity_key(&self) -> &str {
        &self.source_entity_key
    }

    /// Edge direction
    pub fn direction(&self) -> RelationshipDirection {
        self.relationship_direction
    }

    /// Property sets used to match the external target
    pub fn target_filter_keys(&self) -> &[Vec<String>] {
        &self.target_filter_keys
    }

    /// Properties of the external target
    pub fn target_entity(&self) -> &BTreeMap<String, PropertyValue> {
        &self.target_entity
    }

    /// Whether the sink must leave the target uncreated
    pub fn skip_target_creation(&self) -> bool {
        self.skip_target_creation
    }
}
