//! Baseline and score-history persistence
//!
//! Persistence goes through a host-provided key-value capability with
//! string keys and JSON-typed payloads. Two façades sit on top of it:
//! [`BaselineStore`] for per-metric baselines and [`ScoreHistoryStore`] for
//! the rolling map of daily fatigue scores.
//!
//! Last write wins on same-day collisions; there are no transactional
//! guarantees beyond the host store's own atomicity.

use crate::error::EngineError;
use crate::types::{BaselineRecord, MetricKind};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Days of score history retained before purging.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

const HISTORY_KEY: &str = "fatigue.history";

fn baseline_key(kind: MetricKind) -> String {
    format!("baseline.{kind}")
}

/// Host-provided key-value persistence capability.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError>;
    async fn put(&self, key: &str, value: String) -> Result<(), EngineError>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), EngineError> {
        self.entries.write().await.insert(key.to_owned(), value);
        Ok(())
    }
}

/// File-backed store holding a single JSON map. Every write rewrites the
/// file; adequate for the handful of keys the engine persists.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, EngineError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(EngineError::Persistence(e.to_string())),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let _guard = self.lock.read().await;
        Ok(self.load()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), EngineError> {
        let _guard = self.lock.write().await;
        let mut entries = self.load()?;
        entries.insert(key.to_owned(), value);
        let encoded = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.path, encoded).map_err(|e| EngineError::Persistence(e.to_string()))
    }
}

/// Persistence façade for per-metric baselines.
#[derive(Clone)]
pub struct BaselineStore {
    store: Arc<dyn KeyValueStore>,
}

impl BaselineStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored baseline record for `kind`, if one was ever saved.
    pub async fn get(&self, kind: MetricKind) -> Result<Option<BaselineRecord>, EngineError> {
        match self.store.get(&baseline_key(kind)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Save a recomputed baseline, stamping `today` as its last-updated day.
    ///
    /// `last_updated` never moves backwards: if the stored record already
    /// carries a later day, that day is kept.
    pub async fn save(
        &self,
        kind: MetricKind,
        value: f64,
        today: NaiveDate,
    ) -> Result<(), EngineError> {
        let last_updated = match self.get(kind).await? {
            Some(existing) if existing.last_updated > today => existing.last_updated,
            _ => today,
        };
        let record = BaselineRecord {
            kind,
            value,
            last_updated,
        };
        debug!(kind = %kind, value, %last_updated, "saving baseline");
        self.store
            .put(&baseline_key(kind), serde_json::to_string(&record)?)
            .await
    }

    /// Whether the baseline for `kind` is stale: never saved, or last saved
    /// on a day other than `today`.
    pub async fn should_update(
        &self,
        kind: MetricKind,
        today: NaiveDate,
    ) -> Result<bool, EngineError> {
        Ok(match self.get(kind).await? {
            Some(record) => record.last_updated != today,
            None => true,
        })
    }
}

/// Persistence façade for the day-keyed fatigue score history.
#[derive(Clone)]
pub struct ScoreHistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl ScoreHistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All retained daily scores, oldest first.
    pub async fn scores(&self) -> Result<BTreeMap<NaiveDate, u8>, EngineError> {
        match self.store.get(HISTORY_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Upsert the score for `day`. At most one entry per day; the latest
    /// write wins.
    pub async fn save_daily_score(&self, day: NaiveDate, score: u8) -> Result<(), EngineError> {
        let mut scores = self.scores().await?;
        scores.insert(day, score);
        self.write(&scores).await
    }

    /// Drop entries older than `days` before `today`.
    pub async fn purge_older_than(&self, days: i64, today: NaiveDate) -> Result<(), EngineError> {
        let cutoff = today - Duration::days(days);
        let mut scores = self.scores().await?;
        let before = scores.len();
        scores.retain(|day, _| *day >= cutoff);
        if scores.len() != before {
            debug!(purged = before - scores.len(), %cutoff, "purged stale score history");
            self.write(&scores).await?;
        }
        Ok(())
    }

    /// Mean score over the trailing 7 days, 0.0 with no entries.
    pub async fn weekly_average(&self, today: NaiveDate) -> Result<f64, EngineError> {
        self.average_since(today - Duration::days(7)).await
    }

    /// Mean score over the trailing 30 days, 0.0 with no entries.
    pub async fn monthly_average(&self, today: NaiveDate) -> Result<f64, EngineError> {
        self.average_since(today - Duration::days(30)).await
    }

    /// One score per trailing day ending at `today`, oldest first, 0 for
    /// days without an entry.
    pub async fn trend(&self, days: i64, today: NaiveDate) -> Result<Vec<u8>, EngineError> {
        let scores = self.scores().await?;
        let mut out = Vec::with_capacity(days.max(0) as usize);
        for offset in (0..days).rev() {
            let day = today - Duration::days(offset);
            out.push(scores.get(&day).copied().unwrap_or(0));
        }
        Ok(out)
    }

    async fn average_since(&self, cutoff: NaiveDate) -> Result<f64, EngineError> {
        let scores = self.scores().await?;
        let recent: Vec<u8> = scores
            .iter()
            .filter(|(day, _)| **day >= cutoff)
            .map(|(_, score)| *score)
            .collect();
        if recent.is_empty() {
            return Ok(0.0);
        }
        Ok(recent.iter().map(|s| f64::from(*s)).sum::<f64>() / recent.len() as f64)
    }

    async fn write(&self, scores: &BTreeMap<NaiveDate, u8>) -> Result<(), EngineError> {
        self.store
            .put(HISTORY_KEY, serde_json::to_string(scores)?)
            .await
    }
}
