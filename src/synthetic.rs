//! Deterministic synthetic health-data provider
//!
//! Generates plausible per-day values without a platform health store, so
//! the engine can run in demos, the CLI, and tests. Values are a pure
//! function of the calendar day, so repeated runs produce identical scores.
//!
//! Test hooks allow overriding values, denying access per kind, simulating
//! empty queries, and failing individual signal types.

use crate::error::EngineError;
use crate::provider::{Aggregation, HealthProvider, TimeRange};
use crate::types::{MetricKind, MetricSample, SleepInterval, SleepStage};
use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Synthetic provider with deterministic day-seeded values.
pub struct SyntheticProvider {
    granted: HashSet<MetricKind>,
    overrides: Mutex<HashMap<MetricKind, f64>>,
    failing: Mutex<HashSet<MetricKind>>,
    empty: Mutex<HashSet<MetricKind>>,
    changes: broadcast::Sender<MetricKind>,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            granted: MetricKind::ALL.into_iter().collect(),
            overrides: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            empty: Mutex::new(HashSet::new()),
            changes,
        }
    }
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant access only to the given kinds.
    pub fn granting(kinds: impl IntoIterator<Item = MetricKind>) -> Self {
        Self {
            granted: kinds.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Pin the current value for `kind`, overriding the day-seeded one.
    pub fn set_value(&self, kind: MetricKind, value: f64) {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind, value);
    }

    /// Make every query for `kind` fail with `ProviderUnavailable`.
    pub fn fail_kind(&self, kind: MetricKind) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);
    }

    /// Make every query for `kind` succeed with no data.
    pub fn empty_kind(&self, kind: MetricKind) {
        self.empty
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(kind);
    }

    /// Emit a change notification, as the platform store would on new samples.
    pub fn emit_change(&self, kind: MetricKind) {
        // No receivers is fine; nothing is observing yet.
        let _ = self.changes.send(kind);
    }

    fn check(&self, kind: MetricKind) -> Result<bool, EngineError> {
        if self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind)
        {
            return Err(EngineError::ProviderUnavailable(kind));
        }
        Ok(!self
            .empty
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&kind))
    }

    fn override_for(&self, kind: MetricKind) -> Option<f64> {
        self.overrides
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&kind)
            .copied()
    }

    fn day_value(kind: MetricKind, day: NaiveDate) -> f64 {
        let seed = i64::from(day.num_days_from_ce());
        match kind {
            MetricKind::HeartRate => 55.0 + (seed * 13 % 20) as f64,
            MetricKind::Steps => 7_000.0 + (seed * 97 % 5_000) as f64,
            MetricKind::Calories => 400.0 + (seed * 37 % 300) as f64,
            // Sleep is served through intervals, not scalar samples
            MetricKind::Sleep => 0.0,
        }
    }

    fn night_intervals(day: NaiveDate) -> Vec<SleepInterval> {
        let seed = i64::from(day.num_days_from_ce());
        let asleep_min = 360 + seed * 17 % 120;
        let deep_min = asleep_min * 18 / 100;
        let rem_min = asleep_min / 5;
        let light_min = asleep_min - deep_min - rem_min;

        let start = day.and_hms_opt(22, 30, 0).unwrap_or_default().and_utc() - Duration::days(1);
        let mut intervals = Vec::new();
        let mut cursor = start;
        for (stage, minutes) in [
            (SleepStage::Light, light_min),
            (SleepStage::Deep, deep_min),
            (SleepStage::Rem, rem_min),
            (SleepStage::Awake, 25),
        ] {
            let end = cursor + Duration::minutes(minutes);
            intervals.push(SleepInterval {
                stage,
                start: cursor,
                end,
            });
            cursor = end;
        }
        intervals
    }
}

#[async_trait]
impl HealthProvider for SyntheticProvider {
    async fn request_access(
        &self,
        kinds: &[MetricKind],
    ) -> Result<HashSet<MetricKind>, EngineError> {
        Ok(kinds
            .iter()
            .copied()
            .filter(|kind| self.granted.contains(kind))
            .collect())
    }

    async fn latest_sample(
        &self,
        kind: MetricKind,
        range: TimeRange,
    ) -> Result<Option<MetricSample>, EngineError> {
        if !self.check(kind)? {
            return Ok(None);
        }
        let raw_value = self
            .override_for(kind)
            .unwrap_or_else(|| Self::day_value(kind, range.end.date_naive()));
        Ok(Some(MetricSample {
            kind,
            raw_value,
            observed_at: range.end,
        }))
    }

    async fn aggregate(
        &self,
        kind: MetricKind,
        range: TimeRange,
        _aggregation: Aggregation,
    ) -> Result<Option<f64>, EngineError> {
        if !self.check(kind)? {
            return Ok(None);
        }
        Ok(Some(
            self.override_for(kind)
                .unwrap_or_else(|| Self::day_value(kind, range.start.date_naive())),
        ))
    }

    async fn sleep_intervals(&self, range: TimeRange) -> Result<Vec<SleepInterval>, EngineError> {
        if !self.check(MetricKind::Sleep)? {
            return Ok(Vec::new());
        }
        Ok(Self::night_intervals(range.end.date_naive()))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<MetricKind> {
        self.changes.subscribe()
    }
}
