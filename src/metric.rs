//! Per-kind metric state and normalization
//!
//! Each registered [`Metric`] owns a fixed weight, a rolling personal
//! baseline, and the most recently fetched raw value. Normalization converts
//! the raw signal into a contribution toward fatigue in [0, 1]:
//!
//! - Heart rate maps linearly over the absolute 40-100 bpm range; an elevated
//!   resting HR is a fatigue signal independent of personal baseline.
//! - Sleep contributes `1 - quality`, where quality blends duration,
//!   efficiency and deep-sleep fraction.
//! - Steps and calories contribute their relative exertion above baseline,
//!   floored at zero below baseline.
//!
//! Normalization is a pure function of `(raw_value, baseline)`; all I/O
//! happens in the fetch methods.

use crate::error::EngineError;
use crate::provider::{Aggregation, HealthProvider, TimeRange};
use crate::store::BaselineStore;
use crate::types::{MetricKind, SleepInterval, SleepStage};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Trailing window used for baseline recalculation, in days.
pub const BASELINE_WINDOW_DAYS: u32 = 30;

/// Target sleep duration for a full duration score, in hours.
const SLEEP_TARGET_HOURS: f64 = 8.0;
/// Sleep efficiency considered fully restorative.
const SLEEP_TARGET_EFFICIENCY: f64 = 0.85;
/// Deep-sleep fraction considered fully restorative.
const SLEEP_TARGET_DEEP_FRACTION: f64 = 0.20;

/// Normalize a raw value into its fatigue contribution in [0, 1].
///
/// Pure; the edge case `baseline <= 0` yields 0 for deviation-based kinds
/// rather than dividing by zero.
pub fn normalize(kind: MetricKind, raw_value: f64, baseline: f64) -> f64 {
    match kind {
        MetricKind::HeartRate => match kind.absolute_range() {
            Some((min, max)) => (raw_value.clamp(min, max) - min) / (max - min),
            None => 0.0,
        },
        MetricKind::Sleep => (1.0 - raw_value).clamp(0.0, 1.0),
        MetricKind::Steps | MetricKind::Calories => {
            if baseline <= 0.0 {
                return 0.0;
            }
            ((raw_value - baseline) / baseline).clamp(0.0, 1.0)
        }
    }
}

/// Blend sleep stage intervals into a quality score in [0, 1].
///
/// Duration vs. 8 h counts 40%, efficiency vs. 85% counts 30%, deep-sleep
/// fraction vs. 20% counts 30%, each component capped at 1. No intervals or
/// zero asleep time scores 0.
pub fn sleep_quality_score(intervals: &[SleepInterval]) -> f64 {
    let mut awake_min = 0.0;
    let mut asleep_min = 0.0;
    let mut deep_min = 0.0;

    for interval in intervals {
        let minutes = interval.duration_minutes();
        match interval.stage {
            SleepStage::Awake => awake_min += minutes,
            SleepStage::Deep => {
                deep_min += minutes;
                asleep_min += minutes;
            }
            SleepStage::Light | SleepStage::Rem | SleepStage::Unknown => asleep_min += minutes,
        }
    }

    if asleep_min <= 0.0 {
        return 0.0;
    }

    let duration_score = ((asleep_min / 60.0) / SLEEP_TARGET_HOURS).min(1.0);
    let efficiency = asleep_min / (asleep_min + awake_min);
    let efficiency_score = (efficiency / SLEEP_TARGET_EFFICIENCY).min(1.0);
    let deep_score = ((deep_min / asleep_min) / SLEEP_TARGET_DEEP_FRACTION).min(1.0);

    0.40 * duration_score + 0.30 * efficiency_score + 0.30 * deep_score
}

/// Live state for one registered metric kind.
pub struct Metric {
    kind: MetricKind,
    weight: f64,
    baseline: f64,
    raw_value: f64,
    provider: Arc<dyn HealthProvider>,
}

impl Metric {
    /// Create a metric with the kind's default baseline and a raw-value
    /// sentinel of 0 until the first fetch completes.
    pub fn new(kind: MetricKind, weight: f64, provider: Arc<dyn HealthProvider>) -> Self {
        debug_assert!(weight > 0.0, "metric weight must be positive");
        Self {
            kind,
            weight,
            baseline: kind.default_baseline(),
            raw_value: 0.0,
            provider,
        }
    }

    /// Create a metric with a baseline restored from persistence.
    pub fn with_baseline(
        kind: MetricKind,
        weight: f64,
        baseline: f64,
        provider: Arc<dyn HealthProvider>,
    ) -> Self {
        let mut metric = Self::new(kind, weight, provider);
        metric.baseline = baseline;
        metric
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn raw_value(&self) -> f64 {
        self.raw_value
    }

    pub(crate) fn provider(&self) -> Arc<dyn HealthProvider> {
        Arc::clone(&self.provider)
    }

    /// Record the raw value fetched by the current scoring cycle. Only the
    /// cycle task calls this, after its fetch branch has joined.
    pub(crate) fn set_raw_value(&mut self, raw_value: f64) {
        self.raw_value = raw_value;
    }

    /// Current fatigue contribution in [0, 1].
    pub fn normalized(&self) -> f64 {
        normalize(self.kind, self.raw_value, self.baseline)
    }

    /// `normalized * weight`; the shared combination rule for every kind.
    pub fn weighted_score(&self) -> f64 {
        self.normalized() * self.weight
    }

    /// Recompute the baseline from trailing history if it was not already
    /// recomputed today, persisting the result. A persistence failure keeps
    /// the in-memory baseline and is logged, never propagated.
    pub async fn recalculate_baseline_if_stale(
        &mut self,
        baselines: &BaselineStore,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let today = now.date_naive();
        if !baselines.should_update(self.kind, today).await? {
            return Ok(());
        }

        let history =
            fetch_historical(self.kind, &self.provider, BASELINE_WINDOW_DAYS, now).await;
        let baseline = if history.is_empty() {
            self.kind.default_baseline()
        } else {
            history.iter().sum::<f64>() / history.len() as f64
        };

        debug!(kind = %self.kind, baseline, days = history.len(), "recalculated baseline");
        self.baseline = baseline;

        if let Err(e) = baselines.save(self.kind, baseline, today).await {
            warn!(kind = %self.kind, error = %e, "failed to persist baseline");
        }
        Ok(())
    }
}

/// Fetch today's raw value for `kind`, degrading provider errors and missing
/// data to 0.0 ("no signal").
pub async fn fetch_current(
    kind: MetricKind,
    provider: &Arc<dyn HealthProvider>,
    now: DateTime<Utc>,
) -> f64 {
    let result = match kind {
        MetricKind::HeartRate => provider
            .latest_sample(kind, TimeRange::trailing_hours(now, 24))
            .await
            .map(|sample| sample.map(|s| s.raw_value)),
        MetricKind::Steps | MetricKind::Calories => {
            provider
                .aggregate(kind, TimeRange::today(now), Aggregation::Sum)
                .await
        }
        MetricKind::Sleep => provider
            .sleep_intervals(TimeRange::trailing_hours(now, 24))
            .await
            .map(|intervals| {
                if intervals.is_empty() {
                    None
                } else {
                    Some(sleep_quality_score(&intervals))
                }
            }),
    };

    match result {
        Ok(Some(value)) => value,
        Ok(None) => {
            debug!(kind = %kind, "no data for current fetch, degrading to 0");
            0.0
        }
        Err(e) => {
            debug!(kind = %kind, error = %e, "current fetch failed, degrading to 0");
            0.0
        }
    }
}

/// Fetch one value per trailing calendar day (yesterday backwards), with the
/// same per-day semantics as [`fetch_current`]: a day without data
/// contributes 0. A provider failure on any day yields an empty history, so
/// the caller falls back to the kind default.
pub async fn fetch_historical(
    kind: MetricKind,
    provider: &Arc<dyn HealthProvider>,
    days: u32,
    now: DateTime<Utc>,
) -> Vec<f64> {
    let mut values = Vec::with_capacity(days as usize);
    for offset in 1..=i64::from(days) {
        let day = now.date_naive() - Duration::days(offset);
        let range = TimeRange::day(day);
        let fetched = match kind {
            MetricKind::HeartRate => provider
                .aggregate(kind, range, Aggregation::Average)
                .await,
            MetricKind::Steps | MetricKind::Calories => {
                provider.aggregate(kind, range, Aggregation::Sum).await
            }
            MetricKind::Sleep => provider.sleep_intervals(range).await.map(|intervals| {
                if intervals.is_empty() {
                    None
                } else {
                    Some(sleep_quality_score(&intervals))
                }
            }),
        };
        match fetched {
            Ok(value) => values.push(value.unwrap_or(0.0)),
            Err(e) => {
                debug!(kind = %kind, error = %e, "historical fetch failed, dropping history");
                return Vec::new();
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticProvider;
    use pretty_assertions::assert_eq;

    fn interval(stage: SleepStage, minutes: i64, offset_min: i64) -> SleepInterval {
        let start = Utc::now() + Duration::minutes(offset_min);
        SleepInterval {
            stage,
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_deviation_zero_at_baseline() {
        assert_eq!(normalize(MetricKind::Steps, 10_000.0, 10_000.0), 0.0);
        assert_eq!(normalize(MetricKind::Calories, 500.0, 500.0), 0.0);
    }

    #[test]
    fn test_deviation_clamps_at_double_baseline() {
        assert_eq!(normalize(MetricKind::Steps, 20_000.0, 10_000.0), 1.0);
        assert_eq!(normalize(MetricKind::Steps, 30_000.0, 10_000.0), 1.0);
    }

    #[test]
    fn test_deviation_floors_below_baseline() {
        assert_eq!(normalize(MetricKind::Steps, 5_000.0, 10_000.0), 0.0);
    }

    #[test]
    fn test_deviation_half_above_baseline() {
        assert_eq!(normalize(MetricKind::Steps, 15_000.0, 10_000.0), 0.5);
        assert_eq!(normalize(MetricKind::Calories, 750.0, 500.0), 0.5);
    }

    #[test]
    fn test_degenerate_baseline_contributes_nothing() {
        assert_eq!(normalize(MetricKind::Steps, 12_000.0, 0.0), 0.0);
        assert_eq!(normalize(MetricKind::Calories, 600.0, -5.0), 0.0);
    }

    #[test]
    fn test_heart_rate_maps_absolute_range() {
        assert_eq!(normalize(MetricKind::HeartRate, 40.0, 60.0), 0.0);
        assert_eq!(normalize(MetricKind::HeartRate, 100.0, 60.0), 1.0);
        assert_eq!(normalize(MetricKind::HeartRate, 70.0, 60.0), 0.5);
        // Clamps outside the semantic range
        assert_eq!(normalize(MetricKind::HeartRate, 30.0, 60.0), 0.0);
        assert_eq!(normalize(MetricKind::HeartRate, 180.0, 60.0), 1.0);
    }

    #[test]
    fn test_heart_rate_monotonically_non_decreasing() {
        let mut previous = 0.0;
        for bpm in 40..=100 {
            let normalized = normalize(MetricKind::HeartRate, f64::from(bpm), 60.0);
            assert!(normalized >= previous, "not monotonic at {bpm} bpm");
            previous = normalized;
        }
    }

    #[test]
    fn test_sleep_inverts_quality() {
        assert_eq!(normalize(MetricKind::Sleep, 1.0, 0.65), 0.0);
        assert_eq!(normalize(MetricKind::Sleep, 0.0, 0.65), 1.0);
        assert!((normalize(MetricKind::Sleep, 0.65, 0.65) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_quality_perfect_night() {
        // 8h asleep with 20% deep and no awake time hits every target
        let intervals = vec![
            interval(SleepStage::Deep, 96, 0),
            interval(SleepStage::Light, 240, 96),
            interval(SleepStage::Rem, 144, 336),
        ];
        let quality = sleep_quality_score(&intervals);
        assert!((quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_quality_blend() {
        // 6h asleep (duration 6/8 = 0.75), 1h awake (efficiency 360/420
        // capped by 0.85 -> 1.0), 36min deep (fraction 0.1 -> 0.5)
        let intervals = vec![
            interval(SleepStage::Deep, 36, 0),
            interval(SleepStage::Light, 324, 36),
            interval(SleepStage::Awake, 60, 360),
        ];
        let quality = sleep_quality_score(&intervals);
        let expected = 0.40 * 0.75 + 0.30 * 1.0 + 0.30 * 0.5;
        assert!((quality - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sleep_quality_no_intervals() {
        assert_eq!(sleep_quality_score(&[]), 0.0);
        // All-awake sessions score zero as well
        let intervals = vec![interval(SleepStage::Awake, 120, 0)];
        assert_eq!(sleep_quality_score(&intervals), 0.0);
    }

    #[test]
    fn test_weighted_score() {
        let provider: Arc<dyn HealthProvider> = Arc::new(SyntheticProvider::default());
        let mut metric = Metric::with_baseline(MetricKind::Steps, 2.0, 10_000.0, provider);
        metric.set_raw_value(15_000.0);
        assert_eq!(metric.normalized(), 0.5);
        assert_eq!(metric.weighted_score(), 1.0);
    }

    #[test]
    fn test_new_metric_starts_at_sentinel() {
        let provider: Arc<dyn HealthProvider> = Arc::new(SyntheticProvider::default());
        let metric = Metric::new(MetricKind::Calories, 1.5, provider);
        assert_eq!(metric.raw_value(), 0.0);
        assert_eq!(metric.baseline(), MetricKind::Calories.default_baseline());
    }
}
