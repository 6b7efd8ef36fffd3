//! Structured progress events emitted by the loader.
//!
//! The loader never prints. It reports through an injected [`LoadObserver`];
//! [`TracingObserver`] forwards events to `tracing` and the metrics registry.

use crate::domain::{AssociationKind, EntityKind};
use crate::metrics::LoaderMetrics;
use std::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    EntityCreated {
        kind: EntityKind,
        id: i64,
        key: String,
    },
    AnchorInserted {
        content_id: i64,
    },
    AnchorSkipped {
        content_id: i64,
    },
    RecordRejected {
        row: usize,
        reason: String,
    },
    EdgeInserted {
        kind: AssociationKind,
        left: i64,
        right: i64,
    },
    EdgeSkipped {
        kind: AssociationKind,
        left: i64,
        right: i64,
    },
    PassFailed {
        kind: AssociationKind,
        error: String,
    },
}

pub trait LoadObserver: Send + Sync {
    fn on_event(&self, event: &LoadEvent);
}

/// Default observer: structured logs plus counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::EntityCreated { kind, id, key } => {
                info!(kind = %kind, id, key = %key, "entity created");
                LoaderMetrics::record_entity_created(*kind);
            }
            LoadEvent::AnchorInserted { content_id } => {
                info!(content_id, "content inserted");
                LoaderMetrics::record_anchor("inserted");
            }
            LoadEvent::AnchorSkipped { content_id } => {
                info!(content_id, "content already exists, skipping record");
                LoaderMetrics::record_anchor("skipped");
            }
            LoadEvent::RecordRejected { row, reason } => {
                warn!(row, reason = %reason, "record rejected");
                LoaderMetrics::record_rejected();
            }
            LoadEvent::EdgeInserted { kind, left, right } => {
                debug!(association = %kind, left, right, "association inserted");
                LoaderMetrics::record_edge(*kind, "inserted");
            }
            LoadEvent::EdgeSkipped { kind, left, right } => {
                debug!(association = %kind, left, right, "association skipped: already exists");
                LoaderMetrics::record_edge(*kind, "skipped");
            }
            LoadEvent::PassFailed { kind, error } => {
                tracing::error!(association = %kind, error = %error, "association pass failed");
            }
        }
    }
}

/// Keeps every event in memory; handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<LoadEvent>>,
}

impl CollectingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl LoadObserver for CollectingObserver {
    fn on_event(&self, event: &LoadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
