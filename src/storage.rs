use crate::domain::{AssociationKind, Content, EntityKind};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

pub mod in_memory;
pub mod sqlite;
#[cfg(feature = "db")]
pub mod turso;

pub use in_memory::InMemoryStorage;
#[cfg(feature = "db")]
pub use turso::LibsqlStorage;
pub use sqlite::SqliteStorage;

/// Schema shared by the SQL-backed stores.
pub(crate) const SCHEMA_SQL: &str = include_str!("../migrations/001_create_catalog_schema.sql");

/// Relational store the loader writes into.
///
/// Lookup tables are addressed by [`EntityKind`], join tables by
/// [`AssociationKind`]. Join tables carry no uniqueness constraint of their
/// own; callers check [`Storage::edge_exists`] before inserting.
#[async_trait]
pub trait Storage: Send + Sync {
    // Lookup tables
    async fn find_entity(&self, kind: EntityKind, key: &str) -> Result<Option<i64>>;
    /// Insert a lookup row and return its store-assigned id.
    async fn insert_entity(&self, kind: EntityKind, key: &str) -> Result<i64>;

    // Anchor table
    async fn content_exists(&self, content_id: i64) -> Result<bool>;
    async fn insert_content(&self, content: &Content) -> Result<()>;
    async fn insert_availability(&self, content_id: i64, availability: i64) -> Result<()>;

    // Join tables
    async fn edge_exists(&self, kind: AssociationKind, left: i64, right: i64) -> Result<bool>;
    async fn insert_edge(&self, kind: AssociationKind, left: i64, right: i64) -> Result<()>;

    // Query methods
    async fn get_content(&self, content_id: i64) -> Result<Option<Content>>;
    async fn get_availability(&self, content_id: i64) -> Result<Option<i64>>;
    async fn list_content_ids(&self) -> Result<Vec<i64>>;
    /// All (id, natural key) rows of a lookup table, ordered by id.
    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<(i64, String)>>;
    /// All edges of a join table, ordered by (left, right).
    async fn list_edges(&self, kind: AssociationKind) -> Result<Vec<(i64, i64)>>;

    async fn table_counts(&self) -> Result<TableCounts> {
        let mut counts = TableCounts::default();
        let content_ids = self.list_content_ids().await?;
        counts.content = content_ids.len();
        for id in content_ids {
            if self.get_availability(id).await?.is_some() {
                counts.availability += 1;
            }
        }
        for kind in EntityKind::ALL {
            counts
                .entities
                .insert(kind, self.list_entities(kind).await?.len());
        }
        for kind in AssociationKind::ALL {
            counts.edges.insert(kind, self.list_edges(kind).await?.len());
        }
        Ok(counts)
    }
}

/// Row counts per table, used for reporting and idempotence checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub content: usize,
    pub availability: usize,
    pub entities: BTreeMap<EntityKind, usize>,
    pub edges: BTreeMap<AssociationKind, usize>,
}
