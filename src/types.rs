//! Core types for the fatigue scoring engine
//!
//! This module defines the data that flows through a scoring cycle: raw
//! samples from the health-data provider, per-metric readings, and the
//! aggregate fatigue score.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of physiological signals the engine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    Sleep,
    Steps,
    Calories,
}

impl MetricKind {
    /// All kinds, in scoring order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::HeartRate,
        MetricKind::Sleep,
        MetricKind::Steps,
        MetricKind::Calories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::Sleep => "sleep",
            MetricKind::Steps => "steps",
            MetricKind::Calories => "calories",
        }
    }

    /// Fallback baseline used when no history is available.
    pub fn default_baseline(&self) -> f64 {
        match self {
            MetricKind::HeartRate => 60.0,
            MetricKind::Sleep => 0.65,
            MetricKind::Steps => 10_000.0,
            MetricKind::Calories => 500.0,
        }
    }

    /// Absolute semantic range, for kinds normalized by range rather than
    /// baseline deviation. Only heart rate uses this today.
    pub fn absolute_range(&self) -> Option<(f64, f64)> {
        match self {
            MetricKind::HeartRate => Some((40.0, 100.0)),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sleep stage classification (vendor-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepStage {
    Awake,
    Light,
    Deep,
    Rem,
    Unknown,
}

/// One contiguous interval of a sleep session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepInterval {
    pub stage: SleepStage,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SleepInterval {
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds().max(0) as f64 / 60.0
    }
}

/// A single observation from the health-data provider. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub raw_value: f64,
    pub observed_at: DateTime<Utc>,
}

/// The 0-100 aggregate score produced by one scoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatigueScore {
    pub value: u8,
    pub computed_at: DateTime<Utc>,
}

/// Persisted per-kind baseline with its last-recalculated day.
///
/// `last_updated` is monotonically non-decreasing; [`crate::store::BaselineStore`]
/// enforces this on save.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineRecord {
    pub kind: MetricKind,
    pub value: f64,
    pub last_updated: NaiveDate,
}

/// Value-copied snapshot of one metric after a completed cycle.
///
/// Published to observers instead of sharing the live metric state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub raw_value: f64,
    pub normalized: f64,
    pub weight: f64,
    pub baseline: f64,
}

/// Result of one complete scoring cycle: the aggregate score plus the
/// per-metric readings it was derived from.
///
/// An empty `readings` map distinguishes "no metrics available" from a real
/// score of zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub score: FatigueScore,
    pub readings: BTreeMap<MetricKind, MetricReading>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_round_trips_through_serde() {
        for kind in MetricKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            let back: MetricKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_kind_string_names() {
        assert_eq!(MetricKind::HeartRate.as_str(), "heart_rate");
        assert_eq!(MetricKind::Calories.to_string(), "calories");
    }

    #[test]
    fn test_only_heart_rate_has_absolute_range() {
        assert_eq!(MetricKind::HeartRate.absolute_range(), Some((40.0, 100.0)));
        assert_eq!(MetricKind::Steps.absolute_range(), None);
        assert_eq!(MetricKind::Sleep.absolute_range(), None);
    }

    #[test]
    fn test_sleep_interval_duration() {
        let start = Utc::now();
        let interval = SleepInterval {
            stage: SleepStage::Deep,
            start,
            end: start + chrono::Duration::minutes(90),
        };
        assert!((interval.duration_minutes() - 90.0).abs() < f64::EPSILON);

        // Inverted intervals clamp to zero rather than going negative
        let inverted = SleepInterval {
            stage: SleepStage::Light,
            start,
            end: start - chrono::Duration::minutes(5),
        };
        assert_eq!(inverted.duration_minutes(), 0.0);
    }
}
