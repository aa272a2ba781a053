//! Fatiguewatch - metric aggregation and scoring engine for wearable fatigue alerting
//!
//! Fatiguewatch reduces independently-sourced physiological signals (resting
//! heart rate, sleep quality, step count, active-energy burn) to a single
//! bounded fatigue score through a deterministic pipeline: per-kind fetch →
//! normalization against a personal baseline → weighted aggregation →
//! threshold alerting.
//!
//! ## Modules
//!
//! - **Scoring core**: [`metric`], [`calculator`] - normalization rules and
//!   the parallel fan-out/join aggregation
//! - **Collaborator contracts**: [`provider`], [`store`], [`notify`] - the
//!   capabilities the engine consumes from its host
//! - **Orchestration**: [`coordinator`] - lifecycle, triggers, persistence,
//!   and the alert policy

pub mod calculator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metric;
pub mod notify;
pub mod provider;
pub mod store;
pub mod synthetic;
pub mod types;

pub use calculator::FatigueCalculator;
pub use config::{AlertPolicy, AlertRearm, EngineConfig, MetricWeights};
pub use coordinator::{CoordinatorState, FatigueCoordinator};
pub use error::EngineError;
pub use metric::{normalize, sleep_quality_score, Metric};
pub use notify::{LogNotifier, Notifier};
pub use provider::{Aggregation, HealthProvider, TimeRange};
pub use store::{BaselineStore, JsonFileStore, KeyValueStore, MemoryStore, ScoreHistoryStore};
pub use synthetic::SyntheticProvider;
pub use types::{
    BaselineRecord, CycleOutcome, FatigueScore, MetricKind, MetricReading, MetricSample,
};

/// Engine version embedded in logs and CLI output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for logs and CLI output
pub const PRODUCER_NAME: &str = "fatiguewatch";
