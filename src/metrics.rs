//! Load counters.
//!
//! Counters are always recorded through the `metrics` facade; they only go
//! anywhere once [`init_metrics`] installs the Prometheus exporter.

use crate::domain::{AssociationKind, EntityKind};
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

pub const ENTITIES_CREATED: &str = "catalog_entities_created_total";
pub const ANCHORS: &str = "catalog_anchors_total";
pub const EDGES: &str = "catalog_edges_total";
pub const RECORDS_REJECTED: &str = "catalog_records_rejected_total";

static INIT: Once = Once::new();

/// Install the Prometheus exporter listening on `addr`. Idempotent.
pub fn init_metrics(addr: SocketAddr) {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
        match builder.install() {
            Ok(()) => {
                info!("Prometheus exporter listening on http://{}/metrics", addr);
                LoaderMetrics::register_metrics();
            }
            Err(e) => {
                warn!("Prometheus exporter install failed (possibly already installed): {}", e);
            }
        }
    });
}

pub struct LoaderMetrics;

impl LoaderMetrics {
    pub fn record_entity_created(kind: EntityKind) {
        metrics::counter!(ENTITIES_CREATED, "kind" => kind.as_str()).increment(1);
    }

    /// `outcome` is "inserted" or "skipped".
    pub fn record_anchor(outcome: &'static str) {
        metrics::counter!(ANCHORS, "outcome" => outcome).increment(1);
    }

    pub fn record_edge(kind: AssociationKind, outcome: &'static str) {
        metrics::counter!(EDGES, "association" => kind.as_str(), "outcome" => outcome).increment(1);
    }

    pub fn record_rejected() {
        metrics::counter!(RECORDS_REJECTED).increment(1);
    }

    /// Pre-register so every series shows up in /metrics before first use.
    fn register_metrics() {
        metrics::describe_counter!(ENTITIES_CREATED, "Lookup rows created, by entity kind");
        metrics::describe_counter!(ANCHORS, "Content rows inserted or skipped as existing");
        metrics::describe_counter!(EDGES, "Association edges inserted or skipped as existing");
        metrics::describe_counter!(RECORDS_REJECTED, "Catalog rows rejected as malformed");
        for kind in EntityKind::ALL {
            let _ = metrics::counter!(ENTITIES_CREATED, "kind" => kind.as_str());
        }
        let _ = metrics::counter!(RECORDS_REJECTED);
    }
}
