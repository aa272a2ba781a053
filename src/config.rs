//! Engine configuration
//!
//! Serde-backed so hosts can persist user settings (enabled metrics, alert
//! policy) alongside their own configuration.

use crate::types::MetricKind;
use serde::{Deserialize, Serialize};

/// How often an above-threshold score may re-fire the alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRearm {
    /// Alert at most once per calendar day.
    OncePerDay,
    /// Alert on every qualifying cycle.
    EveryCycle,
}

/// Alerting threshold policy: fire when `score > threshold`, re-firing
/// governed by `rearm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub threshold: u8,
    pub rearm: AlertRearm,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            threshold: 80,
            rearm: AlertRearm::OncePerDay,
        }
    }
}

/// Engine configuration with the original app's metric weights as defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Metric kinds to request access for and register. At least one must
    /// be enabled for scoring to produce a signal.
    pub enabled_metrics: Vec<MetricKind>,
    /// Relative contribution per kind; entries for disabled kinds are ignored.
    pub weights: MetricWeights,
    pub alerts_enabled: bool,
    pub alert_policy: AlertPolicy,
    /// Days of score history retained before purging.
    pub retention_days: i64,
}

/// Per-kind weights. Each must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub heart_rate: f64,
    pub sleep: f64,
    pub steps: f64,
    pub calories: f64,
}

impl MetricWeights {
    pub fn for_kind(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::HeartRate => self.heart_rate,
            MetricKind::Sleep => self.sleep,
            MetricKind::Steps => self.steps,
            MetricKind::Calories => self.calories,
        }
    }
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            heart_rate: 3.0,
            sleep: 4.0,
            steps: 2.0,
            calories: 1.5,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled_metrics: MetricKind::ALL.to_vec(),
            weights: MetricWeights::default(),
            alerts_enabled: true,
            alert_policy: AlertPolicy::default(),
            retention_days: crate::store::DEFAULT_RETENTION_DAYS,
        }
    }
}
