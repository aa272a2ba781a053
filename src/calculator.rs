//! Weighted aggregation of registered metrics
//!
//! One scoring cycle fans out a fetch task per registered metric, joins on
//! all of them, then computes `round(Σ weighted / Σ weight * 100)` clamped
//! to [0, 100]. The join is counting, not racing: every branch signals
//! completion (success or soft-failure to zero) before any raw value is
//! read by the aggregation step.

use crate::metric::{fetch_current, Metric};
use crate::store::BaselineStore;
use crate::types::{CycleOutcome, FatigueScore, MetricKind, MetricReading};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Owns the live metrics and computes the aggregate fatigue score.
#[derive(Default)]
pub struct FatigueCalculator {
    metrics: BTreeMap<MetricKind, Metric>,
}

impl FatigueCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metric` under its kind, silently replacing any previous
    /// registration.
    pub fn add_metric(&mut self, metric: Metric) {
        self.metrics.insert(metric.kind(), metric);
    }

    pub fn remove_metric(&mut self, kind: MetricKind) -> Option<Metric> {
        self.metrics.remove(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn registered_kinds(&self) -> Vec<MetricKind> {
        self.metrics.keys().copied().collect()
    }

    /// Recompute any baseline not already recomputed today.
    pub async fn recalculate_stale_baselines(
        &mut self,
        baselines: &BaselineStore,
        now: DateTime<Utc>,
    ) {
        for metric in self.metrics.values_mut() {
            if let Err(e) = metric.recalculate_baseline_if_stale(baselines, now).await {
                warn!(kind = %metric.kind(), error = %e, "baseline recalculation failed");
            }
        }
    }

    /// Run one scoring cycle: fan out current-value fetches for every
    /// registered metric, join on all of them, and aggregate.
    ///
    /// An individual fetch failure degrades its metric to a raw value of 0
    /// rather than aborting the cycle. With no metrics registered the score
    /// is 0 and the readings map is empty.
    pub async fn score_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let mut fetches: JoinSet<(MetricKind, f64)> = JoinSet::new();
        for metric in self.metrics.values() {
            let kind = metric.kind();
            let provider = metric.provider();
            fetches.spawn(async move { (kind, fetch_current(kind, &provider, now).await) });
        }

        let mut fetched: BTreeMap<MetricKind, f64> = BTreeMap::new();
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((kind, raw_value)) => {
                    fetched.insert(kind, raw_value);
                }
                Err(e) => warn!(error = %e, "fetch branch did not complete"),
            }
        }

        let mut readings = BTreeMap::new();
        let mut total_weight = 0.0;
        let mut weighted_total = 0.0;

        for metric in self.metrics.values_mut() {
            // A branch that failed to join degrades to the zero sentinel.
            let raw_value = fetched.get(&metric.kind()).copied().unwrap_or(0.0);
            metric.set_raw_value(raw_value);

            total_weight += metric.weight();
            weighted_total += metric.weighted_score();
            readings.insert(
                metric.kind(),
                MetricReading {
                    raw_value,
                    normalized: metric.normalized(),
                    weight: metric.weight(),
                    baseline: metric.baseline(),
                },
            );
        }

        let value = if total_weight > 0.0 {
            ((weighted_total / total_weight) * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
        debug!(score = value, metrics = readings.len(), "scoring cycle complete");

        CycleOutcome {
            score: FatigueScore {
                value,
                computed_at: now,
            },
            readings,
        }
    }
}
