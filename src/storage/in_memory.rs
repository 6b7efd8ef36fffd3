use super::Storage;
use crate::constants::{
    MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME, NEEDS_REVISION_RATING_ID,
    NEEDS_REVISION_RATING_NAME,
};
use crate::domain::{AssociationKind, Content, EntityKind};
use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct LookupTable {
    rows: BTreeMap<i64, String>,
    by_key: HashMap<String, i64>,
    next_id: i64,
}

impl LookupTable {
    fn insert_with_id(&mut self, id: i64, key: &str) {
        self.rows.insert(id, key.to_string());
        self.by_key.insert(key.to_string(), id);
        self.next_id = self.next_id.max(id);
    }
}

#[derive(Debug, Default)]
struct Tables {
    lookups: HashMap<EntityKind, LookupTable>,
    content: BTreeMap<i64, Content>,
    availability: BTreeMap<i64, i64>,
    edges: HashMap<AssociationKind, Vec<(i64, i64)>>,
}

/// In-memory storage implementation for development/testing.
///
/// Mirrors the SQL schema's constraints: lookup keys and content ids are
/// unique, join tables are not, and references are checked the way SQLite
/// checks them with `foreign_keys` on. Content, availability and edge rows
/// must point at rows that already exist.
#[derive(Clone)]
pub struct InMemoryStorage {
    tables: Arc<Mutex<Tables>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    fn has_entity(&self, kind: EntityKind, id: i64) -> bool {
        self.lookups
            .get(&kind)
            .is_some_and(|table| table.rows.contains_key(&id))
    }

    fn check_reference(&self, kind: EntityKind, id: i64, column: &str) -> Result<()> {
        if self.has_entity(kind, id) {
            Ok(())
        } else {
            Err(foreign_key_error(column, id))
        }
    }

    fn check_content(&self, content_id: i64, column: &str) -> Result<()> {
        if self.content.contains_key(&content_id) {
            Ok(())
        } else {
            Err(foreign_key_error(column, content_id))
        }
    }
}

fn foreign_key_error(column: &str, id: i64) -> LoaderError {
    LoaderError::storage(format!("FOREIGN KEY constraint failed: {column} = {id}"))
}

impl InMemoryStorage {
    /// An empty store holding only the sentinel director and rating rows.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        tables
            .lookups
            .entry(EntityKind::Director)
            .or_default()
            .insert_with_id(MULTIPLE_DIRECTORS_ID, MULTIPLE_DIRECTORS_NAME);
        tables
            .lookups
            .entry(EntityKind::Rating)
            .or_default()
            .insert_with_id(NEEDS_REVISION_RATING_ID, NEEDS_REVISION_RATING_NAME);
        Self {
            tables: Arc::new(Mutex::new(tables)),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| LoaderError::storage("in-memory tables lock poisoned"))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_entity(&self, kind: EntityKind, key: &str) -> Result<Option<i64>> {
        let tables = self.tables()?;
        Ok(tables
            .lookups
            .get(&kind)
            .and_then(|table| table.by_key.get(key).copied()))
    }

    async fn insert_entity(&self, kind: EntityKind, key: &str) -> Result<i64> {
        let mut tables = self.tables()?;
        let table = tables.lookups.entry(kind).or_default();
        if table.by_key.contains_key(key) {
            return Err(LoaderError::storage(format!(
                "UNIQUE constraint failed: {}.{} = {key:?}",
                kind.table(),
                kind.key_column()
            )));
        }
        let id = table.next_id + 1;
        table.insert_with_id(id, key);

        debug!("Inserted {} {:?} with id {}", kind, key, id);
        Ok(id)
    }

    async fn content_exists(&self, content_id: i64) -> Result<bool> {
        let tables = self.tables()?;
        Ok(tables.content.contains_key(&content_id))
    }

    async fn insert_content(&self, content: &Content) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.content.contains_key(&content.content_id) {
            return Err(LoaderError::storage(format!(
                "UNIQUE constraint failed: content.content_id = {}",
                content.content_id
            )));
        }
        if let Some(format) = content.format {
            tables.check_reference(EntityKind::Format, format, "content.format")?;
        }
        if let Some(director) = content.director {
            tables.check_reference(EntityKind::Director, director, "content.director")?;
        }
        tables.check_reference(EntityKind::Rating, content.rating, "content.rating")?;
        tables.content.insert(content.content_id, content.clone());

        debug!("Inserted content {}", content.content_id);
        Ok(())
    }

    async fn insert_availability(&self, content_id: i64, availability: i64) -> Result<()> {
        let mut tables = self.tables()?;
        if tables.availability.contains_key(&content_id) {
            return Err(LoaderError::storage(format!(
                "UNIQUE constraint failed: content_availability.content = {content_id}"
            )));
        }
        tables.check_content(content_id, "content_availability.content")?;
        tables.availability.insert(content_id, availability);
        Ok(())
    }

    async fn edge_exists(&self, kind: AssociationKind, left: i64, right: i64) -> Result<bool> {
        let tables = self.tables()?;
        Ok(tables
            .edges
            .get(&kind)
            .is_some_and(|edges| edges.contains(&(left, right))))
    }

    async fn insert_edge(&self, kind: AssociationKind, left: i64, right: i64) -> Result<()> {
        let mut tables = self.tables()?;
        if kind.left_is_content() {
            tables.check_content(left, kind.table())?;
        }
        tables.check_reference(kind.target(), right, kind.table())?;
        tables.edges.entry(kind).or_default().push((left, right));
        Ok(())
    }

    async fn get_content(&self, content_id: i64) -> Result<Option<Content>> {
        let tables = self.tables()?;
        Ok(tables.content.get(&content_id).cloned())
    }

    async fn get_availability(&self, content_id: i64) -> Result<Option<i64>> {
        let tables = self.tables()?;
        Ok(tables.availability.get(&content_id).copied())
    }

    async fn list_content_ids(&self) -> Result<Vec<i64>> {
        let tables = self.tables()?;
        Ok(tables.content.keys().copied().collect())
    }

    async fn list_entities(&self, kind: EntityKind) -> Result<Vec<(i64, String)>> {
        let tables = self.tables()?;
        Ok(tables
            .lookups
            .get(&kind)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .map(|(id, key)| (*id, key.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_edges(&self, kind: AssociationKind) -> Result<Vec<(i64, i64)>> {
        let tables = self.tables()?;
        let mut edges = tables.edges.get(&kind).cloned().unwrap_or_default();
        edges.sort_unstable();
        Ok(edges)
    }
}
