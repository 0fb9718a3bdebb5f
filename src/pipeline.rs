//! Graph assembly pipeline
//!
//! Two steps, run in order:
//! - `fetch-accounts`: accounts, their roles (deduplicated per run), members,
//!   role assignments and identity-provider trust edges
//! - `fetch-zones`: zones, the owning-account edge, and every zone's DNS records
//!
//! Any fetch or sink error aborts the run. Entities already handed to the sink
//! stay there.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collector::{CollectorWarning, ResourceCollector};
use crate::fetcher::transport::{ReqwestTransport, Transport};
use crate::fetcher::FetcherError;
use crate::graph::converter::{
    convert_account, convert_account_member, convert_account_role, convert_record, convert_zone,
    map_identity_provider, IdentityProviderMapping,
};
use crate::graph::sink::{Sink, SinkError};
use crate::graph::{DedupSet, Entity, EntityKind, MappedRelationship, Relationship, RelationshipKind};
use crate::metrics::{record_entity, record_relationship};

/// Zones whose records are fetched concurrently by default
pub const DEFAULT_ZONE_CONCURRENCY: usize = 4;

/// Upper bound for zone concurrency
pub const MAX_ZONE_CONCURRENCY: usize = 32;

/// Step that walks accounts
pub const FETCH_ACCOUNTS_STEP: &str = "fetch-accounts";

/// Step that walks zones
pub const FETCH_ZONES_STEP: &str = "fetch-zones";

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Unrecoverable fetch failure
    #[error(transparent)]
    Fetch(#[from] FetcherError),

    /// Sink rejected an entity or relationship
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Counts produced by one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    /// Step id
    pub id: &'static str,
    /// Human-readable step name
    pub name: &'static str,
    /// Entities added
    pub entities: usize,
    /// Relationships added
    pub relationships: usize,
    /// Mapped relationships added
    pub mapped_relationships: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Per-step counts, in execution order
    pub steps: Vec<StepReport>,
    /// Non-fatal conditions noticed during the run
    pub warnings: Vec<CollectorWarning>,
}

impl PipelineReport {
    /// Entities added across all steps
    pub fn total_entities(&self) -> usize {
        self.steps.iter().map(|s| s.entities).sum()
    }

    /// Relationships added across all steps, mapped ones included
    pub fn total_relationships(&self) -> usize {
        self.steps
            .iter()
            .map(|s| s.relationships + s.mapped_relationships)
            .sum()
    }
}

/// Hands graph items to the sink and counts them for one step
struct StepEmitter<'a, S: Sink + ?Sized> {
    sink: &'a S,
    entities: AtomicUsize,
    relationships: AtomicUsize,
    mapped_relationships: AtomicUsize,
}

impl<'a, S: Sink + ?Sized> StepEmitter<'a, S> {
    fn new(sink: &'a S) -> Self {
        Self {
            sink,
            entities: AtomicUsize::new(0),
            relationships: AtomicUsize::new(0),
            mapped_relationships: AtomicUsize::new(0),
        }
    }

    async fn entity(&self, entity: Entity) -> Result<Entity, SinkError> {
        let entity_type = entity.entity_type().to_string();
        let stored = self.sink.add_entity(entity).await?;
        record_entity(&entity_type);
        self.entities.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }

    async fn relationship(&self, relationship: Relationship) -> Result<(), SinkError> {
        let relationship_type = relationship.relationship_type().to_string();
        self.sink.add_relationship(relationship).await?;
        record_relationship(&relationship_type);
        self.relationships.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn mapped(&self, relationship: MappedRelationship) -> Result<(), SinkError> {
        let relationship_type = relationship.relationship_type().to_string();
        self.sink.add_mapped_relationship(relationship).await?;
        record_relationship(&relationship_type);
        self.mapped_relationships.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn report(&self, id: &'static str, name: &'static str) -> StepReport {
        StepReport {
            id,
            name,
            entities: self.entities.load(Ordering::Relaxed),
            relationships: self.relationships.load(Ordering::Relaxed),
            mapped_relationships: self.mapped_relationships.load(Ordering::Relaxed),
        }
    }
}

/// Walks the Cloudflare resource hierarchy into a sink
pub struct GraphPipeline<S: Sink, T: Transport = ReqwestTransport> {
    collector: ResourceCollector<T>,
    sink: Arc<S>,
    zone_concurrency: usize,
}

impl<S: Sink, T: Transport> GraphPipeline<S, T> {
    /// Pipeline with the default zone concurrency.
    pub fn new(collector: ResourceCollector<T>, sink: Arc<S>) -> Self {
        Self {
            collector,
            sink,
            zone_concurrency: DEFAULT_ZONE_CONCURRENCY,
        }
    }

    /// Fetch records of up to `concurrency` zones at once (clamped to 1..=32).
    pub fn with_zone_concurrency(mut self, concurrency: usize) -> Self {
        self.zone_concurrency = concurrency.clamp(1, MAX_ZONE_CONCURRENCY);
        self
    }

    /// Configured zone concurrency
    pub fn zone_concurrency(&self) -> usize {
        self.zone_concurrency
    }

    /// Collector the pipeline reads from
    pub fn collector(&self) -> &ResourceCollector<T> {
        &self.collector
    }

    /// Run both steps. Every run starts with an empty dedup set.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        let dedup = DedupSet::new();
        let mut warnings = Vec::new();

        let accounts = self.fetch_accounts(&dedup, &mut warnings).await?;
        info!(
            step = accounts.id,
            entities = accounts.entities,
            relationships = accounts.relationships,
            mapped_relationships = accounts.mapped_relationships,
            "Step complete"
        );

        let zones = self.fetch_zones().await?;
        info!(
            step = zones.id,
            entities = zones.entities,
            relationships = zones.relationships,
            "Step complete"
        );

        Ok(PipelineReport {
            steps: vec![accounts, zones],
            warnings,
        })
    }

    async fn fetch_accounts(
        &self,
        dedup: &DedupSet,
        warnings: &mut Vec<CollectorWarning>,
    ) -> Result<StepReport, PipelineError> {
        info!(step = FETCH_ACCOUNTS_STEP, "Fetching accounts, members and roles");
        let emitter = StepEmitter::new(self.sink.as_ref());

        let mut accounts = self.collector.iterate_accounts();
        while let Some(account) = accounts.next().await {
            let account = account?;
            let account_entity = emitter.entity(convert_account(&account)).await?;
            let account_key = account_entity.key();
            debug!(account_id = %account.id, "Processing account");

            self.collect_roles(&emitter, dedup, &account.id, account_key, warnings)
                .await?;
            self.collect_members(&emitter, &account.id, account_key).await?;
            self.collect_identity_providers(&emitter, &account.id, account_key, warnings)
                .await?;
        }

        Ok(emitter.report(
            FETCH_ACCOUNTS_STEP,
            "Fetch Cloudflare Accounts, Members, and Roles",
        ))
    }

    async fn collect_roles(
        &self,
        emitter: &StepEmitter<'_, S>,
        dedup: &DedupSet,
        account_id: &str,
        account_key: &str,
        warnings: &mut Vec<CollectorWarning>,
    ) -> Result<(), PipelineError> {
        let mut linked = HashSet::new();
        let mut roles = self.collector.iterate_account_roles(account_id);
        while let Some(role) = roles.next().await {
            let role = convert_account_role(&role?);
            let role_key = role.key().to_string();

            if dedup.insert_if_absent(&role_key) {
                emitter.entity(role).await?;
            } else {
                let warning = CollectorWarning::RoleKeyCollision {
                    key: role_key.clone(),
                    account_id: account_id.to_string(),
                };
                warn!(account_id, role_key = %role_key, "{}", warning);
                warnings.push(warning);
            }

            // pages can shift mid-walk and repeat a role within one account
            if !linked.insert(role_key.clone()) {
                continue;
            }
            emitter
                .relationship(Relationship::new(
                    RelationshipKind::AccountHasRole,
                    account_key,
                    role_key,
                ))
                .await?;
        }
        Ok(())
    }

    async fn collect_members(
        &self,
        emitter: &StepEmitter<'_, S>,
        account_id: &str,
        account_key: &str,
    ) -> Result<(), PipelineError> {
        let mut members = self.collector.iterate_account_members(account_id);
        while let Some(member) = members.next().await {
            let member = member?;
            let member_entity = emitter.entity(convert_account_member(&member)).await?;
            let member_key = member_entity.key();

            emitter
                .relationship(Relationship::new(
                    RelationshipKind::AccountHasMember,
                    account_key,
                    member_key,
                ))
                .await?;

            for role_id in member.role_ids() {
                let role_key = EntityKind::Role.key(role_id);
                if self.sink.find_entity(&role_key).await.is_none() {
                    debug!(member_key, role_key = %role_key, "Role not collected, skipping assignment");
                    continue;
                }
                emitter
                    .relationship(Relationship::new(
                        RelationshipKind::MemberAssignedRole,
                        member_key,
                        role_key,
                    ))
                    .await?;
            }
        }
        Ok(())
    }

    async fn collect_identity_providers(
        &self,
        emitter: &StepEmitter<'_, S>,
        account_id: &str,
        account_key: &str,
        warnings: &mut Vec<CollectorWarning>,
    ) -> Result<(), PipelineError> {
        let providers = self.collector.iterate_identity_providers(account_id).await?;
        warnings.extend(providers.warning);

        let mut seen = HashSet::new();
        for provider in &providers.items {
            match map_identity_provider(account_key, provider) {
                IdentityProviderMapping::Mapped(mapped) => {
                    if seen.insert(mapped.key().to_string()) {
                        emitter.mapped(mapped).await?;
                    }
                }
                IdentityProviderMapping::UnknownType => {
                    debug!(
                        account_id,
                        provider_id = %provider.id,
                        provider_type = %provider.provider_type,
                        "Identity provider type has no external mapping"
                    );
                }
                IdentityProviderMapping::MissingClientId => {
                    let warning = CollectorWarning::UnmappedIdentityProvider {
                        account_id: account_id.to_string(),
                        provider_id: provider.id.clone(),
                        provider_type: provider.provider_type.clone(),
                    };
                    warn!(account_id, "{}", warning);
                    warnings.push(warning);
                }
            }
        }
        Ok(())
    }

    async fn fetch_zones(&self) -> Result<StepReport, PipelineError> {
        info!(step = FETCH_ZONES_STEP, "Fetching zones and DNS records");
        let emitter = StepEmitter::new(self.sink.as_ref());
        let mut zone_keys = Vec::new();

        let mut zones = self.collector.iterate_zones();
        while let Some(zone) = zones.next().await {
            let zone = zone?;
            let zone_entity = emitter.entity(convert_zone(&zone)).await?;

            match zone.account.as_ref().and_then(|a| a.id.as_deref()) {
                Some(account_id) => {
                    emitter
                        .relationship(Relationship::new(
                            RelationshipKind::AccountHasZone,
                            EntityKind::Account.key(account_id),
                            zone_entity.key(),
                        ))
                        .await?;
                }
                None => debug!(zone_id = %zone.id, "Zone has no account, skipping account relationship"),
            }

            zone_keys.push((zone.id, zone_entity.key().to_string()));
        }
        drop(zones);

        info!(
            zones = zone_keys.len(),
            concurrency = self.zone_concurrency,
            "Fetching DNS records"
        );

        stream::iter(zone_keys)
            .map(|(zone_id, zone_key)| {
                let emitter = &emitter;
                async move { self.collect_zone_records(emitter, &zone_id, &zone_key).await }
            })
            .buffer_unordered(self.zone_concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        Ok(emitter.report(FETCH_ZONES_STEP, "Fetch Cloudflare DNS Zones and Records"))
    }

    async fn collect_zone_records(
        &self,
        emitter: &StepEmitter<'_, S>,
        zone_id: &str,
        zone_key: &str,
    ) -> Result<(), PipelineError> {
        let mut count = 0usize;
        let mut records = self.collector.iterate_zone_records(zone_id);
        while let Some(record) = records.next().await {
            let record_entity = emitter.entity(convert_record(&record?)).await?;
            emitter
                .relationship(Relationship::new(
                    RelationshipKind::ZoneHasRecord,
                    zone_key,
                    record_entity.key(),
                ))
                .await?;
            count += 1;
        }
        debug!(zone_id, records = count, "Collected DNS records");
        Ok(())
    }
}
