//! Graph sinks
//!
//! A [`Sink`] accepts entities and relationships and answers key lookups. The
//! pipeline never reads entities back except through [`Sink::find_entity`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

use crate::graph::{Entity, MappedRelationship, Relationship};

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// An entity with this key was already added
    #[error("duplicate entity key: {0}")]
    DuplicateEntityKey(String),

    /// A relationship with this key was already added
    #[error("duplicate relationship key: {0}")]
    DuplicateRelationshipKey(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination of the assembled graph
///
/// Methods take `&self` so concurrent zone tasks can share one sink.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Store an entity and return the stored form.
    async fn add_entity(&self, entity: Entity) -> SinkResult<Entity>;

    /// Store a relationship.
    async fn add_relationship(&self, relationship: Relationship) -> SinkResult<()>;

    /// Store a relationship to an entity owned by another system.
    async fn add_mapped_relationship(&self, relationship: MappedRelationship) -> SinkResult<()>;

    /// Look up a stored entity by key.
    async fn find_entity(&self, key: &str) -> Option<Entity>;
}

/// Everything a [`MemorySink`] holds, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    /// Stored entities
    pub entities: Vec<Entity>,
    /// Stored relationships
    pub relationships: Vec<Relationship>,
    /// Stored mapped relationships
    pub mapped_relationships: Vec<MappedRelationship>,
}

impl GraphSnapshot {
    /// Keys of all stored entities
    pub fn entity_keys(&self) -> HashSet<String> {
        self.entities.iter().map(|e| e.key().to_string()).collect()
    }

    /// `(from, class, to)` tuples of all stored relationships
    pub fn edge_tuples(&self) -> HashSet<(String, String, String)> {
        self.relationships
            .iter()
            .map(|r| {
                (
                    r.from_key().to_string(),
                    r.class().as_str().to_string(),
                    r.to_key().to_string(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Default)]
struct MemoryGraph {
    snapshot: GraphSnapshot,
    entity_index: HashMap<String, usize>,
    relationship_keys: HashSet<String>,
    mapped_keys: HashSet<String>,
}

/// In-memory sink that rejects duplicate keys
#[derive(Debug, Default)]
pub struct MemorySink {
    graph: RwLock<MemoryGraph>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored so far
    pub async fn snapshot(&self) -> GraphSnapshot {
        self.graph.read().await.snapshot.clone()
    }

    /// Number of stored entities
    pub async fn entity_count(&self) -> usize {
        self.graph.read().await.snapshot.entities.len()
    }

    /// Number of stored relationships, mapped ones included
    pub async fn relationship_count(&self) -> usize {
        let graph = self.graph.read().await;
        graph.snapshot.relationships.len() + graph.snapshot.mapped_relationships.len()
    }

    /// Write the snapshot as pretty-printed JSON.
    pub async fn write_json(&self, path: &Path) -> SinkResult<()> {
        let snapshot = self.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;

        info!(
            path = %path.display(),
            entities = snapshot.entities.len(),
            relationships = snapshot.relationships.len(),
            mapped_relationships = snapshot.mapped_relationships.len(),
            "Wrote graph snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn add_entity(&self, entity: Entity) -> SinkResult<Entity> {
        let mut graph = self.graph.write().await;
        if graph.entity_index.contains_key(entity.key()) {
            return Err(SinkError::DuplicateEntityKey(entity.key().to_string()));
        }
        let index = graph.snapshot.entities.len();
        graph.entity_index.insert(entity.key().to_string(), index);
        graph.snapshot.entities.push(entity.clone());
        Ok(entity)
    }

    async fn add_relationship(&self, relationship: Relationship) -> SinkResult<()> {
        let mut graph = self.graph.write().await;
        if !graph.relationship_keys.insert(relationship.key().to_string()) {
            return Err(SinkError::DuplicateRelationshipKey(
                relationship.key().to_string(),
            ));
        }
        graph.snapshot.relationships.push(relationship);
        Ok(())
    }

    async fn add_mapped_relationship(&self, relationship: MappedRelationship) -> SinkResult<()> {
        let mut graph = self.graph.write().await;
        if !graph.mapped_keys.insert(relationship.key().to_string()) {
            return Err(SinkError::DuplicateRelationshipKey(
                relationship.key().to_string(),
            ));
        }
        graph.snapshot.mapped_relationships.push(relationship);
        Ok(())
    }

    async fn find_entity(&self, key: &str) -> Option<Entity> {
        let graph = self.graph.read().await;
        graph
            .entity_index
            .get(key)
            .and_then(|&index| graph.snapshot.entities.get(index))
            .cloned()
    }
}
