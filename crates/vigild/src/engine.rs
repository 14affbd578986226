//! The evaluation engine: tick loop, watchdog heartbeat, and dispatch
//! plumbing.
//!
//! Each tick snapshots the active configuration, evaluates every
//! objective's burn-rate rules concurrently against the metric source,
//! applies the results to the alert store, routes the resulting
//! transitions into notification groups, and hands due flushes to the
//! dispatch worker over a bounded queue. The loop itself never sends a
//! notification and never blocks on one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use vigil_alerts::{
    filter_notifiable, Alert, AlertStore, AlertStoreConfig, Observation, Severity, SilenceStore,
    SnapshotStore, StateSnapshot, Transition, TransitionKind, LABEL_ALERTNAME, LABEL_SERVICE,
    LABEL_SEVERITY,
};
use vigil_config::{CompiledConfig, SharedConfig};
use vigil_metrics::MetricSource;
use vigil_notify::{DispatchOutcome, Dispatcher, Receiver};
use vigil_routing::{FlushJob, GroupCoordinator};
use vigil_slo::{
    window_literal, BudgetTracker, BurnRateEvaluator, BurnRateRule, ErrorBudget, SliDefinition,
    SliEvaluator, SloError, SloObjective,
};

/// Alert name attached to every burn-rate observation.
pub const BURN_ALERTNAME: &str = "ErrorBudgetBurn";

/// Alert name of the dead man's switch heartbeat.
pub const WATCHDOG_ALERTNAME: &str = "Watchdog";

/// Service label carried by the watchdog alert.
pub const WATCHDOG_SERVICE: &str = "vigil";

/// Flushes queued between the engine and the dispatch worker.
const QUEUE_DEPTH: usize = 256;

/// Liveness bookkeeping for the evaluation loop.
///
/// A tick that never happens cannot report its own absence, so liveness
/// is judged from the outside: the last tick must be within twice the
/// configured interval. Before the first tick the engine start time
/// stands in, which keeps a freshly started daemon healthy.
#[derive(Debug)]
pub struct EngineHealth {
    started_at: DateTime<Utc>,
    inner: RwLock<HealthInner>,
}

#[derive(Debug, Clone, Copy, Default)]
struct HealthInner {
    last_tick_at: Option<DateTime<Utc>>,
    last_tick_duration: Duration,
    ticks: u64,
    tick_errors: u64,
}

impl EngineHealth {
    /// Creates health state for an engine started at `started_at`.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            inner: RwLock::new(HealthInner::default()),
        }
    }

    fn record_tick(&self, at: DateTime<Utc>, duration: Duration, errors: u64) {
        let mut inner = self.inner.write();
        inner.last_tick_at = Some(at);
        inner.last_tick_duration = duration;
        inner.ticks += 1;
        inner.tick_errors += errors;
    }

    /// True when the last tick is recent enough for the given interval.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>, tick_interval: Duration) -> bool {
        let last = self.inner.read().last_tick_at.unwrap_or(self.started_at);
        let budget =
            chrono::Duration::milliseconds((tick_interval.as_millis() as i64).saturating_mul(2));
        now.signed_duration_since(last) <= budget
    }

    /// Point-in-time copy of the liveness counters.
    #[must_use]
    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.inner.read();
        HealthSnapshot {
            last_tick_at: inner.last_tick_at,
            last_tick_duration_ms: inner.last_tick_duration.as_millis() as u64,
            ticks: inner.ticks,
            tick_errors: inner.tick_errors,
        }
    }
}

/// Serializable view of the engine's liveness counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// When the last evaluation cycle completed.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Wall-clock duration of the last cycle.
    pub last_tick_duration_ms: u64,
    /// Completed evaluation cycles since startup.
    pub ticks: u64,
    /// Objectives skipped on query failure or timeout, cumulative.
    pub tick_errors: u64,
}

/// Point-in-time budget standing of one objective, refreshed each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloStatus {
    /// Objective name.
    pub name: String,
    /// Service the underlying SLI measures.
    pub service: String,
    /// Name of the underlying SLI.
    pub sli: String,
    /// Target good-event ratio.
    pub target: f64,
    /// Error budget over the compliance period.
    pub budget: ErrorBudget,
    /// When this standing was computed.
    pub evaluated_at: DateTime<Utc>,
}

/// What one evaluation cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    /// Objectives the cycle attempted to evaluate.
    pub objectives: usize,
    /// Alert state transitions produced.
    pub transitions: usize,
    /// Route decisions recorded into notification groups.
    pub routed: usize,
    /// Due flushes handed to the dispatch worker.
    pub flushed: usize,
    /// Objectives skipped on query failure or timeout.
    pub errors: usize,
}

/// One flush resolved against the config snapshot that routed it,
/// ready for delivery.
#[derive(Debug)]
pub struct DispatchItem {
    /// The due flush from the group coordinator.
    pub job: FlushJob,
    /// Current alert state for the group, already silence/inhibition
    /// filtered.
    pub alerts: Vec<Alert>,
    /// The receiver the group routes to.
    pub receiver: Receiver,
}

/// Drains the dispatch queue on its own task, decoupled from the
/// evaluation loop.
#[derive(Debug)]
pub struct DispatchWorker {
    queue: mpsc::Receiver<DispatchItem>,
    dispatcher: Dispatcher,
}

impl DispatchWorker {
    /// Receives the next queued flush. Returns `None` once the engine
    /// is dropped and the queue fully drained.
    pub async fn next(&mut self) -> Option<DispatchItem> {
        self.queue.recv().await
    }

    /// Delivers one flush to its receiver.
    pub async fn deliver(&self, item: &DispatchItem) -> DispatchOutcome {
        self.dispatcher
            .dispatch(&item.job, &item.alerts, &item.receiver)
            .await
    }

    /// Pumps the queue until it closes.
    pub async fn run(mut self) {
        while let Some(item) = self.next().await {
            let outcome = self.deliver(&item).await;
            debug!(
                group = %item.job.group_key,
                receiver = item.receiver.name(),
                outcome = ?outcome,
                "flush dispatched"
            );
        }
        debug!("dispatch queue closed, worker exiting");
    }
}

/// The evaluation engine.
///
/// Owns the alert store, silence store, and group coordinator; the
/// HTTP API reads them through shared handles. Constructed together
/// with its [`DispatchWorker`]; the two halves share the dispatch
/// queue.
pub struct Engine {
    config: SharedConfig,
    source: Arc<dyn MetricSource>,
    store: AlertStore,
    silences: SilenceStore,
    coordinator: GroupCoordinator,
    snapshots: Option<SnapshotStore>,
    health: Arc<EngineHealth>,
    budgets: Arc<RwLock<Vec<SloStatus>>>,
    queue: mpsc::Sender<DispatchItem>,
}

impl Engine {
    /// Creates an engine and its dispatch worker.
    ///
    /// The alert store's resolved-alert retention is fixed from the
    /// configuration active at startup.
    #[must_use]
    pub fn new(
        config: SharedConfig,
        source: Arc<dyn MetricSource>,
        dispatcher: Dispatcher,
        snapshots: Option<SnapshotStore>,
        started_at: DateTime<Utc>,
    ) -> (Arc<Self>, DispatchWorker) {
        let retention = config.current().engine.resolved_retention;
        let store = AlertStore::with_config(AlertStoreConfig {
            resolved_retention: retention,
            ..AlertStoreConfig::default()
        });
        let (queue, rx) = mpsc::channel(QUEUE_DEPTH);

        let engine = Arc::new(Self {
            config,
            source,
            store,
            silences: SilenceStore::new(),
            coordinator: GroupCoordinator::new(),
            snapshots,
            health: Arc::new(EngineHealth::new(started_at)),
            budgets: Arc::new(RwLock::new(Vec::new())),
            queue,
        });
        let worker = DispatchWorker {
            queue: rx,
            dispatcher,
        };
        (engine, worker)
    }

    /// Loads the persisted state snapshot, if any, into the stores.
    ///
    /// An unreadable snapshot is logged and skipped; the daemon starts
    /// with empty state rather than refusing to boot.
    pub fn restore_persisted(&self) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        match snapshots.load() {
            Ok(Some(snapshot)) => {
                info!(
                    alerts = snapshot.alerts.len(),
                    silences = snapshot.silences.len(),
                    path = %snapshots.path().display(),
                    "restored persisted state"
                );
                self.store.hydrate(snapshot.alerts);
                self.silences.hydrate(snapshot.silences);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "state snapshot unreadable, starting fresh"),
        }
    }

    /// Shared handle to the alert store.
    #[must_use]
    pub fn store(&self) -> AlertStore {
        self.store.clone()
    }

    /// Shared handle to the silence store.
    #[must_use]
    pub fn silences(&self) -> SilenceStore {
        self.silences.clone()
    }

    /// Shared handle to the liveness state.
    #[must_use]
    pub fn health(&self) -> Arc<EngineHealth> {
        Arc::clone(&self.health)
    }

    /// The budget standing of every objective as of the last tick.
    #[must_use]
    pub fn slo_statuses(&self) -> Vec<SloStatus> {
        self.budgets.read().clone()
    }

    /// Drops all notification groups and re-tracks every firing alert
    /// under the currently installed route tree.
    ///
    /// Group keys bind the receiver and grouping labels of the route
    /// that created them, so a reload can leave groups keyed to routes
    /// that no longer exist. Re-tracked groups start a fresh
    /// `group_wait` cycle.
    pub fn reroute_active(&self, now: DateTime<Utc>) {
        let cfg = self.config.current();
        self.coordinator.clear();
        let mut regrouped = 0;
        for alert in self.store.firing() {
            for decision in cfg.route.route(&alert.labels) {
                self.coordinator
                    .track(&decision, &alert.labels, alert.fingerprint, false, now);
                regrouped += 1;
            }
        }
        info!(regrouped, "notification groups rebuilt");
    }

    /// Runs one evaluation cycle at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickSummary {
        let started = Instant::now();
        let cfg = self.config.current();

        let (observations, fresh, errors) = self.evaluate_all(&cfg, now).await;
        self.refresh_budgets(&cfg, fresh);

        let mut transitions: Vec<Transition> = Vec::new();
        for observation in observations {
            if let Some(transition) = self.store.observe(observation, now) {
                transitions.push(transition);
            }
        }
        if cfg.engine.watchdog.enabled {
            if let Some(transition) = self.store.observe(watchdog_observation(), now) {
                transitions.push(transition);
            }
        }

        let routed = self.route_transitions(&cfg, &transitions, now);
        let flushed = self.flush_due(&cfg, now);

        self.store.gc(now);
        self.silences.gc(now, cfg.engine.resolved_retention);
        self.persist(now);

        let summary = TickSummary {
            objectives: cfg.objectives.len(),
            transitions: transitions.len(),
            routed,
            flushed,
            errors,
        };
        self.health.record_tick(now, started.elapsed(), errors as u64);
        debug!(
            objectives = summary.objectives,
            transitions = summary.transitions,
            routed = summary.routed,
            flushed = summary.flushed,
            errors = summary.errors,
            "tick complete"
        );
        summary
    }

    /// Ticks on the configured interval until `shutdown` fires.
    ///
    /// A changed `tick_interval` is picked up after the tick that
    /// observes the new configuration.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut period = self.config.current().engine.tick_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = period.as_millis() as u64, "evaluation loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                    let current = self.config.current().engine.tick_interval;
                    if current != period {
                        period = current;
                        ticker = tokio::time::interval_at(
                            tokio::time::Instant::now() + period,
                            period,
                        );
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                        info!(interval_ms = period.as_millis() as u64, "tick interval changed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("evaluation loop stopping");
                    break;
                }
            }
        }
    }

    /// Evaluates every objective concurrently, bounded by the
    /// configured concurrency cap and per-query deadline.
    ///
    /// A timed-out or failing objective is abandoned for this cycle:
    /// it produces no observations, so its alerts keep their previous
    /// state.
    async fn evaluate_all(
        &self,
        cfg: &CompiledConfig,
        now: DateTime<Utc>,
    ) -> (Vec<Observation>, HashMap<String, SloStatus>, usize) {
        let limit = cfg.engine.max_concurrent_evaluations.max(1);
        let deadline = cfg.engine.query_timeout;

        // Collected eagerly: a borrowing iterator held across the await
        // trips rustc's "Send is not general enough" limitation when the
        // engine future is spawned.
        let work: Vec<_> = cfg
            .objectives
            .iter()
            .filter_map(|objective| {
                let sli = cfg.sli_for(objective)?.clone();
                Some((objective.clone(), sli))
            })
            .collect();

        let results: Vec<Option<(Vec<Observation>, SloStatus)>> = stream::iter(work)
            .map(|(objective, sli)| {
                let source = Arc::clone(&self.source);
                async move {
                    let name = objective.name.clone();
                    let task = tokio::task::spawn_blocking(move || {
                        evaluate_objective(source.as_ref(), &objective, &sli, now)
                    });
                    match timeout(deadline, task).await {
                        Ok(Ok(Ok(output))) => Some(output),
                        Ok(Ok(Err(err))) => {
                            warn!(
                                objective = %name,
                                error = %err,
                                "evaluation failed, alert state preserved"
                            );
                            None
                        }
                        Ok(Err(err)) => {
                            warn!(objective = %name, error = %err, "evaluation task failed");
                            None
                        }
                        Err(_) => {
                            warn!(
                                objective = %name,
                                timeout_ms = deadline.as_millis() as u64,
                                "evaluation timed out, abandoned for this cycle"
                            );
                            None
                        }
                    }
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        let errors = results.iter().filter(|r| r.is_none()).count();
        let mut observations = Vec::new();
        let mut statuses = HashMap::new();
        for (obs, status) in results.into_iter().flatten() {
            observations.extend(obs);
            statuses.insert(status.name.clone(), status);
        }
        (observations, statuses, errors)
    }

    /// Replaces the cached budget standings, keeping the last known
    /// standing for objectives that failed to evaluate this cycle.
    fn refresh_budgets(&self, cfg: &CompiledConfig, mut fresh: HashMap<String, SloStatus>) {
        let mut budgets = self.budgets.write();
        let mut next = Vec::with_capacity(cfg.objectives.len());
        for objective in &cfg.objectives {
            if let Some(status) = fresh.remove(&objective.name) {
                next.push(status);
            } else if let Some(stale) = budgets.iter().find(|s| s.name == objective.name) {
                next.push(stale.clone());
            }
        }
        *budgets = next;
    }

    /// Feeds notifiable transitions into the group coordinator.
    ///
    /// Pending transitions and resolutions of alerts that never fired
    /// stay internal.
    fn route_transitions(
        &self,
        cfg: &CompiledConfig,
        transitions: &[Transition],
        now: DateTime<Utc>,
    ) -> usize {
        let mut routed = 0;
        for transition in transitions {
            let resolved = match transition.kind {
                TransitionKind::Fired => false,
                TransitionKind::Resolved { was_firing: true } => true,
                TransitionKind::Pending | TransitionKind::Resolved { was_firing: false } => {
                    continue;
                }
            };
            let alert = &transition.alert;
            for decision in cfg.route.route(&alert.labels) {
                self.coordinator
                    .track(&decision, &alert.labels, alert.fingerprint, resolved, now);
                routed += 1;
            }
        }
        routed
    }

    /// Collects due flushes, applies the silence and inhibition filter,
    /// and enqueues survivors for dispatch. Never blocks on the queue.
    fn flush_due(&self, cfg: &CompiledConfig, now: DateTime<Utc>) -> usize {
        let mut flushed = 0;
        let firing = self.store.firing();
        for job in self.coordinator.due(now) {
            let members = self.store.by_fingerprints(&job.fingerprints);
            let candidates =
                filter_notifiable(members, &firing, &self.silences, &cfg.inhibit_rules, now);
            if candidates.is_empty() {
                debug!(group = %job.group_key, "flush fully suppressed");
                continue;
            }
            let Some(receiver) = cfg.receivers.get(&job.receiver) else {
                warn!(
                    receiver = %job.receiver,
                    group = %job.group_key,
                    "receiver vanished after a reload, dropping flush"
                );
                continue;
            };
            let receiver = receiver.clone();
            let item = DispatchItem {
                job,
                alerts: candidates,
                receiver,
            };
            match self.queue.try_send(item) {
                Ok(()) => flushed += 1,
                Err(err) => warn!(error = %err, "dispatch queue full, flush dropped"),
            }
        }
        flushed
    }

    /// Writes the state snapshot, when persistence is enabled. A failed
    /// write is retried on the next tick.
    fn persist(&self, now: DateTime<Utc>) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        let snapshot = StateSnapshot::new(now, self.store.snapshot(), self.silences.snapshot());
        if let Err(err) = snapshots.save(&snapshot) {
            warn!(error = %err, "state snapshot save failed");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("alerts", &self.store.count())
            .field("silences", &self.silences.count())
            .finish_non_exhaustive()
    }
}

/// Evaluates one objective: every burn-rate rule plus the compliance
/// budget. Runs synchronously on a blocking thread.
fn evaluate_objective(
    source: &dyn MetricSource,
    objective: &SloObjective,
    sli: &SliDefinition,
    now: DateTime<Utc>,
) -> Result<(Vec<Observation>, SloStatus), SloError> {
    let mut observations = Vec::with_capacity(objective.burn_rules.len());
    for rule in &objective.burn_rules {
        let short = window_ratio(source, sli, rule.short_window, now)?;
        let long = window_ratio(source, sli, rule.long_window, now)?;
        let decision = BurnRateEvaluator::evaluate(rule, objective.target, short, long);
        observations.push(burn_observation(objective, sli, rule, decision.fire, decision.value));
    }

    let period = SliEvaluator::counts(source, sli, objective.compliance_period, now)?;
    let budget = BudgetTracker::track(objective, &[period]);
    let status = SloStatus {
        name: objective.name.clone(),
        service: sli.service.clone(),
        sli: sli.name.clone(),
        target: objective.target,
        budget,
        evaluated_at: now,
    };
    Ok((observations, status))
}

/// Ratio over one window. A window with no events reads as `None`,
/// which the burn evaluator treats as not-firing; a query failure
/// aborts the whole objective.
fn window_ratio(
    source: &dyn MetricSource,
    sli: &SliDefinition,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Option<f64>, SloError> {
    match SliEvaluator::evaluate_window(source, sli, window, now) {
        Ok(ratio) => Ok(Some(ratio)),
        Err(SloError::InsufficientData { sli: name }) => {
            debug!(sli = %name, window = %window_literal(window), "window has no events");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Builds the observation a burn-rate rule reports this cycle.
///
/// Both windows appear in the label set, so two rules of the same
/// objective never collapse into one fingerprint.
fn burn_observation(
    objective: &SloObjective,
    sli: &SliDefinition,
    rule: &BurnRateRule,
    active: bool,
    value: f64,
) -> Observation {
    let labels = HashMap::from([
        (LABEL_ALERTNAME.to_string(), BURN_ALERTNAME.to_string()),
        (LABEL_SERVICE.to_string(), sli.service.clone()),
        (
            LABEL_SEVERITY.to_string(),
            rule.severity.as_str().to_string(),
        ),
        ("slo".to_string(), objective.name.clone()),
        ("short_window".to_string(), window_literal(rule.short_window)),
        ("long_window".to_string(), window_literal(rule.long_window)),
    ]);
    let annotations = HashMap::from([(
        "summary".to_string(),
        format!(
            "{} burning error budget at {:.1}x over {}",
            sli.service,
            value,
            window_literal(rule.short_window),
        ),
    )]);
    Observation {
        labels,
        annotations,
        value,
        for_duration: rule.for_duration,
        active,
    }
}

/// The always-firing heartbeat injected when the watchdog is enabled.
fn watchdog_observation() -> Observation {
    let labels = HashMap::from([
        (LABEL_ALERTNAME.to_string(), WATCHDOG_ALERTNAME.to_string()),
        (LABEL_SERVICE.to_string(), WATCHDOG_SERVICE.to_string()),
        (
            LABEL_SEVERITY.to_string(),
            Severity::Info.as_str().to_string(),
        ),
    ]);
    let annotations = HashMap::from([(
        "summary".to_string(),
        "vigil evaluation pipeline heartbeat".to_string(),
    )]);
    Observation {
        labels,
        annotations,
        value: 1.0,
        for_duration: Duration::ZERO,
        active: true,
    }
}
