//! Entity resolution: natural key -> surrogate id, creating rows on first sight.

use crate::domain::{EntityKind, Resolution};
use crate::error::{LoaderError, Result};
use crate::normalize::FieldValue;
use crate::observer::{LoadEvent, LoadObserver};
use crate::storage::Storage;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    pub cache_hits: usize,
    pub store_hits: usize,
    pub created: usize,
}

/// Owns id assignment for one entity kind.
///
/// The cache is write-through: every id it holds is already durable. It starts
/// empty, so rows from earlier runs are found by the store lookup instead.
#[derive(Debug)]
pub struct EntityResolver {
    kind: EntityKind,
    cache: HashMap<String, i64>,
    stats: ResolverStats,
}

impl EntityResolver {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            cache: HashMap::new(),
            stats: ResolverStats::default(),
        }
    }

    pub fn cached(&self, name: &str) -> Option<i64> {
        self.cache.get(name).copied()
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    #[instrument(skip(self, storage, observer), fields(kind = %self.kind))]
    pub async fn resolve(
        &mut self,
        storage: &dyn Storage,
        observer: &dyn LoadObserver,
        name: &str,
    ) -> Result<i64> {
        if name.is_empty() {
            return Err(LoaderError::MissingField(format!(
                "empty {} name passed to resolver",
                self.kind
            )));
        }

        if let Some(id) = self.cache.get(name) {
            self.stats.cache_hits += 1;
            return Ok(*id);
        }

        if let Some(id) = storage.find_entity(self.kind, name).await? {
            debug!("Found existing {}: {} ({})", self.kind, name, id);
            self.stats.store_hits += 1;
            self.cache.insert(name.to_string(), id);
            return Ok(id);
        }

        let id = storage.insert_entity(self.kind, name).await?;
        self.stats.created += 1;
        self.cache.insert(name.to_string(), id);
        observer.on_event(&LoadEvent::EntityCreated {
            kind: self.kind,
            id,
            key: name.to_string(),
        });
        Ok(id)
    }

    /// Resolve every name in a normalized field, keeping its shape.
    pub async fn resolve_field(
        &mut self,
        storage: &dyn Storage,
        observer: &dyn LoadObserver,
        value: &FieldValue,
    ) -> Result<Resolution> {
        match value {
            FieldValue::Absent => Ok(Resolution::Absent),
            FieldValue::Token(name) => Ok(Resolution::Single(
                self.resolve(storage, observer, name).await?,
            )),
            FieldValue::Tokens(names) => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    ids.push(self.resolve(storage, observer, name).await?);
                }
                Ok(Resolution::Many(ids))
            }
        }
    }
}

/// One resolver per entity kind, each with its own cache.
#[derive(Debug)]
pub struct ResolverSet {
    resolvers: HashMap<EntityKind, EntityResolver>,
}

impl Default for ResolverSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverSet {
    pub fn new() -> Self {
        Self {
            resolvers: EntityKind::ALL
                .into_iter()
                .map(|kind| (kind, EntityResolver::new(kind)))
                .collect(),
        }
    }

    pub fn resolver_mut(&mut self, kind: EntityKind) -> &mut EntityResolver {
        self.resolvers
            .entry(kind)
            .or_insert_with(|| EntityResolver::new(kind))
    }

    pub async fn resolve(
        &mut self,
        kind: EntityKind,
        storage: &dyn Storage,
        observer: &dyn LoadObserver,
        value: &FieldValue,
    ) -> Result<Resolution> {
        self.resolver_mut(kind)
            .resolve_field(storage, observer, value)
            .await
    }

    pub fn stats(&self) -> BTreeMap<EntityKind, ResolverStats> {
        self.resolvers
            .iter()
            .map(|(kind, resolver)| (*kind, resolver.stats().clone()))
            .collect()
    }
}
