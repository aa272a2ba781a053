//! Orchestration layer
//!
//! [`FatigueCoordinator`] owns the calculator and drives it: it authorizes
//! with the health-data provider, registers metrics for the granted signal
//! types, subscribes to change notifications, and runs scoring cycles on
//! every trigger. Each completed cycle is persisted and checked against the
//! alert policy.
//!
//! Cycles are serialized behind an async mutex; a trigger that arrives while
//! a cycle is in flight waits for the previous join to complete, and the
//! latest completed outcome wins. Everything the coordinator exposes to
//! consumers is a value-copied snapshot.

use crate::calculator::FatigueCalculator;
use crate::config::{AlertRearm, EngineConfig};
use crate::error::EngineError;
use crate::metric::Metric;
use crate::notify::Notifier;
use crate::provider::HealthProvider;
use crate::store::{BaselineStore, KeyValueStore, ScoreHistoryStore};
use crate::types::{CycleOutcome, FatigueScore, MetricKind, MetricReading};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Alert notification title, matching the user-facing copy of the original app.
const ALERT_TITLE: &str = "Fatigue Warning";

/// Coordinator lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Authorizing,
    Observing,
    Scoring,
}

/// Dependency-injected orchestration service. Construct one per process and
/// share it by `Arc`; there is no global instance.
pub struct FatigueCoordinator {
    provider: Arc<dyn HealthProvider>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    calculator: Mutex<FatigueCalculator>,
    baselines: BaselineStore,
    history: ScoreHistoryStore,
    state: RwLock<CoordinatorState>,
    latest: RwLock<Option<CycleOutcome>>,
    notifications_granted: AtomicBool,
    last_alert_day: Mutex<Option<NaiveDate>>,
}

impl FatigueCoordinator {
    pub fn new(
        provider: Arc<dyn HealthProvider>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            provider,
            notifier,
            config,
            calculator: Mutex::new(FatigueCalculator::new()),
            baselines: BaselineStore::new(Arc::clone(&store)),
            history: ScoreHistoryStore::new(store),
            state: RwLock::new(CoordinatorState::Idle),
            latest: RwLock::new(None),
            notifications_granted: AtomicBool::new(false),
            last_alert_day: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> CoordinatorState {
        *self.state.read().await
    }

    /// Authorize, register metrics, subscribe to change notifications, and
    /// run the initial scoring cycle.
    ///
    /// Resolves to `false` if the provider granted access to none of the
    /// configured signal types; the coordinator then stays in `Authorizing`
    /// and scoring is unavailable. A per-kind denial only skips that
    /// metric's registration. Notification access is optional and only
    /// gates alert delivery.
    pub async fn start(self: &Arc<Self>) -> Result<bool, EngineError> {
        *self.state.write().await = CoordinatorState::Authorizing;

        let granted = self
            .provider
            .request_access(&self.config.enabled_metrics)
            .await?;
        if granted.is_empty() {
            warn!("health data access denied for all configured signal types");
            return Ok(false);
        }

        let notifications = self.notifier.request_access().await;
        self.notifications_granted
            .store(notifications, Ordering::Relaxed);
        if !notifications {
            info!("notification access not granted, alerting disabled");
        }

        {
            let mut calculator = self.calculator.lock().await;
            for kind in &self.config.enabled_metrics {
                if !granted.contains(kind) {
                    info!(kind = %kind, "access denied, metric not registered");
                    continue;
                }
                let baseline = match self.baselines.get(*kind).await {
                    Ok(Some(record)) => record.value,
                    Ok(None) => kind.default_baseline(),
                    Err(e) => {
                        warn!(kind = %kind, error = %e, "failed to load baseline, using default");
                        kind.default_baseline()
                    }
                };
                calculator.add_metric(Metric::with_baseline(
                    *kind,
                    self.config.weights.for_kind(*kind),
                    baseline,
                    Arc::clone(&self.provider),
                ));
            }
        }

        self.spawn_change_listener();
        *self.state.write().await = CoordinatorState::Observing;
        self.run_cycle().await;
        Ok(true)
    }

    /// Explicit user-triggered refresh: runs one scoring cycle and returns
    /// its score.
    pub async fn refresh(&self) -> FatigueScore {
        self.run_cycle().await
    }

    /// Latest completed cycle's score, 0 before the first cycle.
    pub async fn current_score(&self) -> u8 {
        self.latest
            .read()
            .await
            .as_ref()
            .map(|outcome| outcome.score.value)
            .unwrap_or(0)
    }

    /// Per-metric readings from the latest completed cycle. An empty map
    /// means no metrics are available, as opposed to a real score of zero.
    pub async fn metric_snapshot(&self) -> BTreeMap<MetricKind, MetricReading> {
        self.latest
            .read()
            .await
            .as_ref()
            .map(|outcome| outcome.readings.clone())
            .unwrap_or_default()
    }

    /// Mean persisted score over the trailing 7 days.
    pub async fn weekly_average(&self) -> Result<f64, EngineError> {
        self.history.weekly_average(Utc::now().date_naive()).await
    }

    /// Mean persisted score over the trailing 30 days.
    pub async fn monthly_average(&self) -> Result<f64, EngineError> {
        self.history.monthly_average(Utc::now().date_naive()).await
    }

    /// Daily scores for the trailing `days`, oldest first, 0 for gaps.
    pub async fn trend(&self, days: i64) -> Result<Vec<u8>, EngineError> {
        self.history.trend(days, Utc::now().date_naive()).await
    }

    /// Run one complete scoring cycle: recompute stale baselines, fan out
    /// and join metric fetches, aggregate, persist, and evaluate the alert
    /// policy. Persistence failures are logged and never withhold the score.
    async fn run_cycle(&self) -> FatigueScore {
        let now = Utc::now();
        let cycle_id = Uuid::new_v4();
        debug!(%cycle_id, "scoring cycle started");

        // The calculator lock serializes cycles: a new trigger waits for the
        // previous cycle's join to complete.
        let outcome = {
            let mut calculator = self.calculator.lock().await;
            *self.state.write().await = CoordinatorState::Scoring;
            calculator
                .recalculate_stale_baselines(&self.baselines, now)
                .await;
            calculator.score_cycle(now).await
        };

        let score = outcome.score;
        *self.latest.write().await = Some(outcome);

        let today = now.date_naive();
        if let Err(e) = self.history.save_daily_score(today, score.value).await {
            warn!(%cycle_id, error = %e, "failed to persist daily score");
        }
        if let Err(e) = self
            .history
            .purge_older_than(self.config.retention_days, today)
            .await
        {
            warn!(%cycle_id, error = %e, "failed to purge score history");
        }

        self.evaluate_alert(score.value, today).await;
        *self.state.write().await = CoordinatorState::Observing;
        info!(%cycle_id, score = score.value, "scoring cycle complete");
        score
    }

    async fn evaluate_alert(&self, score: u8, today: NaiveDate) {
        if score <= self.config.alert_policy.threshold {
            return;
        }
        if !self.config.alerts_enabled || !self.notifications_granted.load(Ordering::Relaxed) {
            debug!(score, "alert suppressed: notifications unavailable");
            return;
        }

        let mut last_alert_day = self.last_alert_day.lock().await;
        if self.config.alert_policy.rearm == AlertRearm::OncePerDay
            && *last_alert_day == Some(today)
        {
            debug!(score, "alert suppressed: already fired today");
            return;
        }
        *last_alert_day = Some(today);
        drop(last_alert_day);

        self.notifier
            .deliver(
                ALERT_TITLE,
                &format!("Fatigue score {score}: you are predicted to be fatigued"),
            )
            .await;
    }

    fn spawn_change_listener(self: &Arc<Self>) {
        let mut changes = self.provider.subscribe_changes();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(kind) => {
                        let Some(coordinator) = weak.upgrade() else {
                            break;
                        };
                        debug!(kind = %kind, "provider change notification");
                        coordinator.run_cycle().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // Collapsed triggers still yield one fresh cycle on
                        // the next delivery.
                        debug!(skipped, "change notifications lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::store::MemoryStore;
    use crate::synthetic::SyntheticProvider;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct RecordingNotifier {
        grant: bool,
        delivered: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new(grant: bool) -> Self {
            Self {
                grant,
                delivered: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn count(&self) -> usize {
            self.delivered.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn request_access(&self) -> bool {
            self.grant
        }

        async fn deliver(&self, title: &str, body: &str) {
            self.delivered
                .lock()
                .unwrap()
                .push(format!("{title}: {body}"));
        }
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, EngineError> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: String) -> Result<(), EngineError> {
            Err(EngineError::Persistence("disk full".to_owned()))
        }
    }

    async fn seed_baselines(store: &Arc<MemoryStore>, kinds: &[(MetricKind, f64)]) {
        let store: Arc<dyn KeyValueStore> = store.clone();
        let baselines = BaselineStore::new(store);
        let today = Utc::now().date_naive();
        for (kind, value) in kinds {
            baselines.save(*kind, *value, today).await.unwrap();
        }
    }

    fn coordinator(
        provider: Arc<SyntheticProvider>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
        config: EngineConfig,
    ) -> Arc<FatigueCoordinator> {
        Arc::new(FatigueCoordinator::new(
            provider,
            notifier,
            store,
            config,
        ))
    }

    #[tokio::test]
    async fn test_start_fails_soft_with_no_grants() {
        let provider = Arc::new(SyntheticProvider::granting(Vec::new()));
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = coordinator(
            provider,
            Arc::clone(&notifier),
            Arc::new(MemoryStore::new()),
            EngineConfig::default(),
        );

        let ready = coordinator.start().await.unwrap();
        assert!(!ready);
        assert_eq!(coordinator.state().await, CoordinatorState::Authorizing);
        assert!(coordinator.metric_snapshot().await.is_empty());
        assert_eq!(coordinator.current_score().await, 0);
    }

    #[tokio::test]
    async fn test_per_kind_denial_skips_registration() {
        let provider = Arc::new(SyntheticProvider::granting([
            MetricKind::Steps,
            MetricKind::Calories,
        ]));
        let store = Arc::new(MemoryStore::new());
        seed_baselines(
            &store,
            &[(MetricKind::Steps, 10_000.0), (MetricKind::Calories, 500.0)],
        )
        .await;
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = coordinator(
            provider,
            notifier,
            store,
            EngineConfig::default(),
        );

        let ready = coordinator.start().await.unwrap();
        assert!(ready);
        assert_eq!(coordinator.state().await, CoordinatorState::Observing);

        let snapshot = coordinator.metric_snapshot().await;
        assert!(snapshot.contains_key(&MetricKind::Steps));
        assert!(snapshot.contains_key(&MetricKind::Calories));
        assert!(!snapshot.contains_key(&MetricKind::Sleep));
        assert!(!snapshot.contains_key(&MetricKind::HeartRate));
    }

    #[tokio::test]
    async fn test_high_score_fires_alert_once_per_day() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::HeartRate]));
        provider.set_value(MetricKind::HeartRate, 100.0);
        let store = Arc::new(MemoryStore::new());
        seed_baselines(&store, &[(MetricKind::HeartRate, 60.0)]).await;
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = coordinator(
            provider,
            Arc::clone(&notifier),
            store,
            EngineConfig::default(),
        );

        coordinator.start().await.unwrap();
        assert_eq!(coordinator.current_score().await, 100);
        assert_eq!(notifier.count(), 1);

        // A second qualifying cycle on the same day does not re-fire
        coordinator.refresh().await;
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_every_cycle_rearm_refires() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::HeartRate]));
        provider.set_value(MetricKind::HeartRate, 100.0);
        let store = Arc::new(MemoryStore::new());
        seed_baselines(&store, &[(MetricKind::HeartRate, 60.0)]).await;
        let notifier = Arc::new(RecordingNotifier::new(true));
        let mut config = EngineConfig::default();
        config.alert_policy.rearm = AlertRearm::EveryCycle;
        let coordinator = coordinator(provider, Arc::clone(&notifier), store, config);

        coordinator.start().await.unwrap();
        coordinator.refresh().await;
        assert_eq!(notifier.count(), 2);
    }

    #[tokio::test]
    async fn test_denied_notifications_disable_alerting_only() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::HeartRate]));
        provider.set_value(MetricKind::HeartRate, 100.0);
        let store = Arc::new(MemoryStore::new());
        seed_baselines(&store, &[(MetricKind::HeartRate, 60.0)]).await;
        let notifier = Arc::new(RecordingNotifier::new(false));
        let coordinator = coordinator(
            provider,
            Arc::clone(&notifier),
            store,
            EngineConfig::default(),
        );

        let ready = coordinator.start().await.unwrap();
        assert!(ready);
        // Scoring still works; only delivery is disabled
        assert_eq!(coordinator.current_score().await, 100);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_below_threshold_never_alerts() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::Steps]));
        provider.set_value(MetricKind::Steps, 10_000.0);
        let store = Arc::new(MemoryStore::new());
        seed_baselines(&store, &[(MetricKind::Steps, 10_000.0)]).await;
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = coordinator(
            provider,
            Arc::clone(&notifier),
            store,
            EngineConfig::default(),
        );

        coordinator.start().await.unwrap();
        assert_eq!(coordinator.current_score().await, 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_persistence_failure_still_returns_score() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::HeartRate]));
        provider.set_value(MetricKind::HeartRate, 70.0);
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = Arc::new(FatigueCoordinator::new(
            provider,
            notifier,
            Arc::new(FailingStore),
            EngineConfig::default(),
        ));

        let ready = coordinator.start().await.unwrap();
        assert!(ready);
        // HR 70 maps to 0.5 over [40,100] -> score 50 despite the dead store
        assert_eq!(coordinator.current_score().await, 50);
        assert!(coordinator.weekly_average().await.unwrap() == 0.0);
    }

    #[tokio::test]
    async fn test_cycle_persists_daily_score() {
        let provider = Arc::new(SyntheticProvider::granting([MetricKind::HeartRate]));
        provider.set_value(MetricKind::HeartRate, 70.0);
        let store = Arc::new(MemoryStore::new());
        seed_baselines(&store, &[(MetricKind::HeartRate, 60.0)]).await;
        let notifier = Arc::new(RecordingNotifier::new(true));
        let coordinator = coordinator(
            provider,
            notifier,
            store,
            EngineConfig::default(),
        );

        coordinator.start().await.unwrap();
        assert_eq!(coordinator.weekly_average().await.unwrap(), 50.0);
        assert_eq!(coordinator.trend(1).await.unwrap(), vec![50]);
    }
}
