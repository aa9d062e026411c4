//! Per-leaf consumption totals: fetch each selected leaf's series for a
//! time window and reduce it with the integrator.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::integrator::integrate;
use crate::store::{NodeStore, SeriesStore, StoreError};

/// One consumption query: which leaves, which source, which window.
///
/// The window is half-open `[start, end)`. Day boundaries are the
/// caller's business (see [`day_window`]); this core passes the instants
/// through untouched.
#[derive(Debug, Clone)]
pub struct ConsumptionRequest {
    pub attribute: String,
    pub leaf_paths: Vec<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafTotal {
    pub path: String,
    pub display_name: String,
    /// Integrated consumption in value-hours (kWh for kW sources).
    pub total: f64,
}

#[derive(Debug)]
pub struct LeafFailure {
    pub path: String,
    pub error: StoreError,
}

/// Totals for the leaves that worked plus failures for those that did
/// not. One bad leaf never discards the rest of the report.
#[derive(Debug, Default)]
pub struct ConsumptionReport {
    pub totals: Vec<LeafTotal>,
    pub failures: Vec<LeafFailure>,
}

pub struct Aggregator<N, S> {
    nodes: Arc<N>,
    series: Arc<S>,
}

impl<N: NodeStore, S: SeriesStore> Aggregator<N, S> {
    pub fn new(nodes: Arc<N>, series: Arc<S>) -> Self {
        Self { nodes, series }
    }

    /// One scalar per requested leaf. A leaf that fails to resolve or has
    /// no such source is reported as a failure and skipped; the remaining
    /// leaves still produce totals.
    pub async fn total_consumption(&self, request: &ConsumptionRequest) -> ConsumptionReport {
        let mut report = ConsumptionReport::default();
        for path in &request.leaf_paths {
            match self.leaf_total(path, request).await {
                Ok(total) => report.totals.push(total),
                Err(error) => {
                    warn!(path = %path, attribute = %request.attribute, error = %error,
                        "leaf skipped from consumption report");
                    report.failures.push(LeafFailure {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        report
    }

    async fn leaf_total(
        &self,
        path: &str,
        request: &ConsumptionRequest,
    ) -> Result<LeafTotal, StoreError> {
        let node = self.nodes.resolve(path).await?;
        if let Some(attribute) = node.attribute_named(&request.attribute) {
            debug!(path = %path, source_ref = %attribute.source_ref, "integrating source");
        }
        let series = self
            .series
            .series_for(&node.path, &request.attribute, request.start, request.end)
            .await?;
        Ok(LeafTotal {
            display_name: node.display_name,
            path: node.path,
            total: integrate(&series),
        })
    }
}

/// Midnight-to-midnight window for one calendar day in a fixed zone,
/// expressed as UTC instants. Fixed offsets have no transitions, so the
/// window is always exactly 24 hours.
pub fn day_window(day: NaiveDate, zone: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = day.and_time(NaiveTime::MIN);
    let start = DateTime::<Utc>::from_naive_utc_and_offset(
        local_midnight - Duration::seconds(i64::from(zone.local_minus_utc())),
        Utc,
    );
    (start, start + Duration::hours(24))
}
