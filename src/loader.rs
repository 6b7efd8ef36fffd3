//! Batch orchestration: anchors first, then one fan-out pass per association.
//!
//! Every write is preceded by an existence check, so re-running a batch
//! against a partially or fully populated store adds nothing twice.

use crate::assembler::{assemble, AssociationTargets, ResolvedFields};
use crate::config::LoaderConfig;
use crate::constants::{AVAILABLE, MULTIPLE_DIRECTORS_ID};
use crate::domain::{AssociationKind, EntityKind, RawRecord};
use crate::error::{LoaderError, Result};
use crate::normalize::NormalizedRecord;
use crate::observer::{LoadEvent, LoadObserver};
use crate::reader::CatalogBatch;
use crate::resolver::{ResolverSet, ResolverStats};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeStats {
    pub inserted: usize,
    pub skipped: usize,
}

/// Summary of one load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_read: usize,
    pub records_rejected: usize,
    pub anchors_inserted: usize,
    pub anchors_skipped: usize,
    pub entities: BTreeMap<EntityKind, ResolverStats>,
    pub edges: BTreeMap<AssociationKind, EdgeStats>,
    pub failed_passes: Vec<String>,
}

impl LoadReport {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            records_read: 0,
            records_rejected: 0,
            anchors_inserted: 0,
            anchors_skipped: 0,
            entities: BTreeMap::new(),
            edges: BTreeMap::new(),
            failed_passes: Vec::new(),
        }
    }

    fn edge_stats(&mut self, kind: AssociationKind) -> &mut EdgeStats {
        self.edges.entry(kind).or_default()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn edges_inserted(&self, kind: AssociationKind) -> usize {
        self.edges.get(&kind).map_or(0, |stats| stats.inserted)
    }

    pub fn edges_skipped(&self, kind: AssociationKind) -> usize {
        self.edges.get(&kind).map_or(0, |stats| stats.skipped)
    }
}

/// Single-threaded batch loader. Owns the per-kind resolvers for the run.
pub struct Loader<'a> {
    storage: &'a dyn Storage,
    observer: &'a dyn LoadObserver,
    resolvers: ResolverSet,
    config: LoaderConfig,
}

impl<'a> Loader<'a> {
    pub fn new(storage: &'a dyn Storage, observer: &'a dyn LoadObserver, config: LoaderConfig) -> Self {
        Self {
            storage,
            observer,
            resolvers: ResolverSet::new(),
            config,
        }
    }

    pub fn resolvers(&self) -> &ResolverSet {
        &self.resolvers
    }

    /// Load a batch read from a catalog file. Its unreadable rows are reported
    /// as rejected, with the CSV line as the row number.
    pub async fn load_batch(&mut self, batch: &CatalogBatch) -> Result<LoadReport> {
        for unreadable in &batch.unreadable {
            self.observer.on_event(&LoadEvent::RecordRejected {
                row: unreadable.line.unwrap_or_default() as usize,
                reason: unreadable.reason.clone(),
            });
        }
        let mut report = self.load(&batch.records).await?;
        report.records_read += batch.unreadable.len();
        report.records_rejected += batch.unreadable.len();
        Ok(report)
    }

    /// Run the whole pipeline over `records`, in order.
    ///
    /// Storage failures while inserting anchors abort immediately. The fan-out
    /// passes are all attempted; if any of them failed the run returns
    /// [`LoaderError::AssociationPasses`] afterwards.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn load(&mut self, records: &[RawRecord]) -> Result<LoadReport> {
        let mut report = LoadReport::new();
        info!(run_id = %report.run_id, "Starting catalog load");

        let mut pending: Vec<AssociationTargets> = Vec::new();
        for (index, raw) in records.iter().enumerate() {
            report.records_read += 1;
            if let Some(targets) = self.load_record(index + 1, raw, &mut report).await? {
                pending.push(targets);
            }
        }
        info!(
            inserted = report.anchors_inserted,
            skipped = report.anchors_skipped,
            rejected = report.records_rejected,
            "Anchor phase finished"
        );

        self.run_association_passes(&pending, &mut report).await;
        report.entities = self.resolvers.stats();
        report.finished_at = Some(Utc::now());

        if !report.failed_passes.is_empty() {
            return Err(LoaderError::AssociationPasses {
                failures: report.failed_passes.clone(),
            });
        }
        info!(run_id = %report.run_id, "Finished catalog load");
        Ok(report)
    }

    /// Anchor phase for one record. Returns the targets for the fan-out passes,
    /// or None when the record contributes no associations.
    async fn load_record(
        &mut self,
        row: usize,
        raw: &RawRecord,
        report: &mut LoadReport,
    ) -> Result<Option<AssociationTargets>> {
        let record = match NormalizedRecord::from_raw(raw) {
            Ok(record) => record,
            Err(e) => {
                report.records_rejected += 1;
                self.observer.on_event(&LoadEvent::RecordRejected {
                    row,
                    reason: e.to_string(),
                });
                return Ok(None);
            }
        };

        let exists = self.storage.content_exists(record.content_id).await?;
        if exists {
            report.anchors_skipped += 1;
            self.observer.on_event(&LoadEvent::AnchorSkipped {
                content_id: record.content_id,
            });
            if !self.config.relink_existing {
                return Ok(None);
            }
        }

        let resolved = self.resolve_fields(&record).await?;
        let assembled = assemble(&record, &resolved);

        if !exists {
            self.storage.insert_content(&assembled.content).await?;
            self.storage
                .insert_availability(assembled.content.content_id, AVAILABLE)
                .await?;
            report.anchors_inserted += 1;
            self.observer.on_event(&LoadEvent::AnchorInserted {
                content_id: assembled.content.content_id,
            });
        }

        if assembled.content.director == Some(MULTIPLE_DIRECTORS_ID) {
            let stats = report.edge_stats(AssociationKind::ContentDirector);
            for director in &assembled.targets.directors {
                self.link(
                    AssociationKind::ContentDirector,
                    assembled.content.content_id,
                    *director,
                    stats,
                )
                .await?;
            }
        }

        Ok(Some(assembled.targets))
    }

    async fn resolve_fields(&mut self, record: &NormalizedRecord) -> Result<ResolvedFields> {
        let storage = self.storage;
        let observer = self.observer;
        let resolvers = &mut self.resolvers;
        Ok(ResolvedFields {
            format: resolvers
                .resolve(EntityKind::Format, storage, observer, &record.format)
                .await?,
            directors: resolvers
                .resolve(EntityKind::Director, storage, observer, &record.directors)
                .await?,
            tags: resolvers
                .resolve(EntityKind::Tag, storage, observer, &record.tags)
                .await?,
            rating: resolvers
                .resolve(EntityKind::Rating, storage, observer, &record.rating)
                .await?,
            release: resolvers
                .resolve(EntityKind::Release, storage, observer, &record.date_added)
                .await?,
            cast: resolvers
                .resolve(EntityKind::Actor, storage, observer, &record.cast)
                .await?,
            countries: resolvers
                .resolve(EntityKind::Country, storage, observer, &record.countries)
                .await?,
        })
    }

    /// Existence check, then insert.
    async fn link(
        &self,
        kind: AssociationKind,
        left: i64,
        right: i64,
        stats: &mut EdgeStats,
    ) -> Result<()> {
        if self.storage.edge_exists(kind, left, right).await? {
            stats.skipped += 1;
            self.observer
                .on_event(&LoadEvent::EdgeSkipped { kind, left, right });
            return Ok(());
        }
        self.storage.insert_edge(kind, left, right).await?;
        stats.inserted += 1;
        self.observer
            .on_event(&LoadEvent::EdgeInserted { kind, left, right });
        Ok(())
    }

    async fn run_pass(
        &self,
        kind: AssociationKind,
        edges: impl Iterator<Item = (i64, i64)>,
        stats: &mut EdgeStats,
    ) -> Result<()> {
        for (left, right) in edges {
            self.link(kind, left, right, stats).await?;
        }
        Ok(())
    }

    async fn run_association_passes(&self, pending: &[AssociationTargets], report: &mut LoadReport) {
        let mut passes: Vec<(AssociationKind, Vec<(i64, i64)>)> = vec![
            (
                AssociationKind::ContentActor,
                pairs(pending, |t| (t.content_id, &t.actors)),
            ),
            (
                AssociationKind::ContentCountry,
                pairs(pending, |t| (t.content_id, &t.countries)),
            ),
            (
                AssociationKind::ContentTag,
                pairs(pending, |t| (t.content_id, &t.tags)),
            ),
            (
                AssociationKind::GenreTag,
                pairs(pending, |t| (t.genre, &t.tags)),
            ),
        ];
        if self.config.link_release_dates {
            passes.push((
                AssociationKind::ContentRelease,
                pairs(pending, |t| (t.content_id, &t.releases)),
            ));
        } else {
            debug!("Release date association pass disabled");
        }

        for (kind, edges) in passes {
            let mut stats = EdgeStats::default();
            let result = self.run_pass(kind, edges.into_iter(), &mut stats).await;
            info!(
                association = %kind,
                inserted = stats.inserted,
                skipped = stats.skipped,
                "Association pass finished"
            );
            let totals = report.edge_stats(kind);
            totals.inserted += stats.inserted;
            totals.skipped += stats.skipped;
            if let Err(e) = result {
                warn!(association = %kind, "Association pass stopped early");
                self.observer.on_event(&LoadEvent::PassFailed {
                    kind,
                    error: e.to_string(),
                });
                report.failed_passes.push(format!("{kind}: {e}"));
            }
        }
    }
}

fn pairs<'t>(
    pending: &'t [AssociationTargets],
    select: impl Fn(&'t AssociationTargets) -> (i64, &'t Vec<i64>),
) -> Vec<(i64, i64)> {
    pending
        .iter()
        .flat_map(|targets| {
            let (left, rights) = select(targets);
            rights.iter().map(move |right| (left, *right))
        })
        .collect()
}
