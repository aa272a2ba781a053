//! Health-data provider contract
//!
//! The engine consumes raw samples from an external platform health store
//! (HealthKit, Health Connect, a vendor cloud). This module defines the
//! asynchronous capability the engine expects from that collaborator, plus
//! the change-notification channel used to trigger scoring cycles.

use crate::error::EngineError;
use crate::types::{MetricKind, MetricSample, SleepInterval};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use tokio::sync::broadcast;

/// Aggregation applied to samples within a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Average,
}

/// Half-open query window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Midnight UTC today through `now`.
    pub fn today(now: DateTime<Utc>) -> Self {
        let start = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self { start, end: now }
    }

    /// The trailing `hours` before `now`.
    pub fn trailing_hours(now: DateTime<Utc>, hours: i64) -> Self {
        Self {
            start: now - Duration::hours(hours),
            end: now,
        }
    }

    /// One full calendar day.
    pub fn day(day: NaiveDate) -> Self {
        let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }
}

/// Asynchronous access to platform health data.
///
/// Implementations wrap the platform health store; a deterministic
/// [`crate::synthetic::SyntheticProvider`] is available for demos and tests.
/// All query methods distinguish "no data" (`Ok(None)`) from a real provider
/// failure; the scoring layer treats both as a zero-valued signal.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    /// Request read access for the given signal types. Returns the subset
    /// that was actually granted; a kind absent from the result is treated
    /// as access-denied and its metric is never registered.
    async fn request_access(
        &self,
        kinds: &[MetricKind],
    ) -> Result<HashSet<MetricKind>, EngineError>;

    /// Most recent sample of `kind` within `range`, if any.
    async fn latest_sample(
        &self,
        kind: MetricKind,
        range: TimeRange,
    ) -> Result<Option<MetricSample>, EngineError>;

    /// Aggregate of all samples of `kind` within `range`, if any.
    async fn aggregate(
        &self,
        kind: MetricKind,
        range: TimeRange,
        aggregation: Aggregation,
    ) -> Result<Option<f64>, EngineError>;

    /// Sleep stage intervals overlapping `range`, oldest first.
    async fn sleep_intervals(&self, range: TimeRange) -> Result<Vec<SleepInterval>, EngineError>;

    /// Subscribe to change notifications. The provider sends the kind whose
    /// data changed; each delivery triggers one scoring cycle.
    fn subscribe_changes(&self) -> broadcast::Receiver<MetricKind>;
}
