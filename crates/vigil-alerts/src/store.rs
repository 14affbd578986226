//! The alert state machine store.
//!
//! [`AlertStore`] owns the canonical lifecycle of every alert:
//! `absent → pending → firing → resolved`, deduplicated by
//! [`Fingerprint`]. Each evaluation cycle reports per-rule observations;
//! the store applies the transition rules and hands back the transitions
//! that occurred so downstream routing can react without re-locking.
//!
//! A cycle that could not evaluate a rule at all (query failure) simply
//! does not call [`AlertStore::observe`] for it, which preserves the
//! previous state: missing data never auto-resolves an alert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::types::{Alert, AlertState, Fingerprint, LABEL_ALERTNAME};

/// Configuration for the alert store.
#[derive(Debug, Clone)]
pub struct AlertStoreConfig {
    /// How long resolved alerts are kept before garbage collection.
    pub resolved_retention: Duration,
    /// Maximum number of alerts to keep.
    pub max_alerts: usize,
}

impl Default for AlertStoreConfig {
    fn default() -> Self {
        Self {
            resolved_retention: Duration::from_secs(300),
            max_alerts: 10_000,
        }
    }
}

/// One rule evaluation outcome, reported to the store each cycle.
#[derive(Debug, Clone)]
pub struct Observation {
    /// The alert's identity labels (must include `alertname`).
    pub labels: HashMap<String, String>,
    /// Annotations attached to the alert on creation.
    pub annotations: HashMap<String, String>,
    /// The observed value (burn rate or ratio).
    pub value: f64,
    /// How long the condition must hold before the alert fires.
    pub for_duration: Duration,
    /// Whether the rule's condition evaluated true this cycle.
    pub active: bool,
}

/// The kind of state change produced by an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A new alert entered the pending state.
    Pending,
    /// An alert started firing.
    Fired,
    /// An active alert resolved.
    Resolved {
        /// Whether the alert had reached the firing state. Resolutions of
        /// never-fired pending alerts carry no notification downstream.
        was_firing: bool,
    },
}

/// A state change, with a snapshot of the alert after the change.
#[derive(Debug, Clone)]
pub struct Transition {
    /// What changed.
    pub kind: TransitionKind,
    /// The alert as of immediately after the transition.
    pub alert: Alert,
}

/// Thread-safe store owning all alert state.
///
/// All transitions for one fingerprint are serialized under the store's
/// write lock; observations for different fingerprints are independent
/// calls and may interleave freely.
#[derive(Debug)]
pub struct AlertStore {
    config: AlertStoreConfig,
    alerts: Arc<RwLock<HashMap<Fingerprint, Alert>>>,
}

impl AlertStore {
    /// Creates a store with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AlertStoreConfig::default())
    }

    /// Creates a store with custom configuration.
    #[must_use]
    pub fn with_config(config: AlertStoreConfig) -> Self {
        Self {
            config,
            alerts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AlertStoreConfig {
        &self.config
    }

    /// Applies one rule observation, returning the transition it caused.
    ///
    /// Re-observing an unchanged condition refreshes the alert's value and
    /// returns `None`; it never creates a second alert for the same label
    /// set.
    pub fn observe(&self, obs: Observation, now: DateTime<Utc>) -> Option<Transition> {
        let fingerprint = Fingerprint::of(&obs.labels);
        let mut alerts = self.alerts.write();

        if obs.active {
            Self::handle_active(&self.config, &mut alerts, fingerprint, obs, now)
        } else {
            Self::handle_inactive(&mut alerts, fingerprint, now)
        }
    }

    fn handle_active(
        config: &AlertStoreConfig,
        alerts: &mut HashMap<Fingerprint, Alert>,
        fingerprint: Fingerprint,
        obs: Observation,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let for_duration = chrono::Duration::seconds(obs.for_duration.as_secs() as i64);

        if let Some(alert) = alerts.get_mut(&fingerprint) {
            if alert.is_active() {
                alert.refresh(obs.value);

                if alert.state == AlertState::Pending
                    && now.signed_duration_since(alert.active_at) >= for_duration
                {
                    alert.fire(now);
                    info!(
                        fingerprint = %fingerprint,
                        alertname = %alert.name(),
                        value = %obs.value,
                        "alert fired"
                    );
                    return Some(Transition {
                        kind: TransitionKind::Fired,
                        alert: alert.clone(),
                    });
                }

                debug!(fingerprint = %fingerprint, value = %obs.value, "alert value refreshed");
                return None;
            }
            // A resolved alert whose condition is true again starts a
            // fresh pending cycle below.
        } else if alerts.len() >= config.max_alerts {
            warn!(
                max_alerts = config.max_alerts,
                alertname = %obs.labels.get(LABEL_ALERTNAME).map_or("unknown", String::as_str),
                "alert cap reached, dropping new alert"
            );
            return None;
        }

        let mut alert = Alert::pending(obs.labels, obs.annotations, obs.value, now);
        if obs.for_duration.is_zero() {
            alert.fire(now);
            let transition = Transition {
                kind: TransitionKind::Fired,
                alert: alert.clone(),
            };
            info!(
                fingerprint = %fingerprint,
                alertname = %alert.name(),
                value = %obs.value,
                "alert fired immediately"
            );
            alerts.insert(fingerprint, alert);
            return Some(transition);
        }

        let transition = Transition {
            kind: TransitionKind::Pending,
            alert: alert.clone(),
        };
        debug!(
            fingerprint = %fingerprint,
            alertname = %alert.name(),
            "alert pending"
        );
        alerts.insert(fingerprint, alert);
        Some(transition)
    }

    fn handle_inactive(
        alerts: &mut HashMap<Fingerprint, Alert>,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<Transition> {
        let alert = alerts.get_mut(&fingerprint)?;
        if !alert.is_active() {
            return None;
        }

        let was_firing = alert.state == AlertState::Firing;
        alert.resolve(now);

        if was_firing {
            info!(
                fingerprint = %fingerprint,
                alertname = %alert.name(),
                "alert resolved"
            );
        } else {
            debug!(
                fingerprint = %fingerprint,
                alertname = %alert.name(),
                "pending alert cleared before firing"
            );
        }

        Some(Transition {
            kind: TransitionKind::Resolved { was_firing },
            alert: alert.clone(),
        })
    }

    /// Garbage-collects resolved alerts past the retention window and
    /// enforces the alert cap.
    pub fn gc(&self, now: DateTime<Utc>) {
        let mut alerts = self.alerts.write();
        let retention =
            chrono::Duration::seconds(self.config.resolved_retention.as_secs() as i64);
        let before = alerts.len();

        alerts.retain(|_, alert| {
            alert
                .resolved_at
                .is_none_or(|resolved_at| now.signed_duration_since(resolved_at) < retention)
        });

        // Enforce the cap by dropping the oldest resolved alerts first
        if alerts.len() > self.config.max_alerts {
            let mut to_remove: Vec<_> = alerts
                .iter()
                .filter(|(_, a)| a.state == AlertState::Resolved)
                .map(|(fp, a)| (*fp, a.resolved_at))
                .collect();
            to_remove.sort_by_key(|(_, t)| *t);

            let remove_count = alerts.len() - self.config.max_alerts;
            for (fp, _) in to_remove.into_iter().take(remove_count) {
                alerts.remove(&fp);
            }
        }

        let removed = before - alerts.len();
        if removed > 0 {
            debug!(removed, "garbage collected resolved alerts");
        }
    }

    /// Returns the alert with the given fingerprint.
    #[must_use]
    pub fn get(&self, fingerprint: Fingerprint) -> Option<Alert> {
        self.alerts.read().get(&fingerprint).cloned()
    }

    /// Returns snapshots for the given fingerprints, skipping any that
    /// have been garbage collected.
    #[must_use]
    pub fn by_fingerprints(&self, fingerprints: &[Fingerprint]) -> Vec<Alert> {
        let alerts = self.alerts.read();
        fingerprints
            .iter()
            .filter_map(|fp| alerts.get(fp).cloned())
            .collect()
    }

    /// Returns all currently firing alerts.
    #[must_use]
    pub fn firing(&self) -> Vec<Alert> {
        let alerts = self.alerts.read();
        alerts
            .values()
            .filter(|a| a.state == AlertState::Firing)
            .cloned()
            .collect()
    }

    /// Returns all alerts, ordered by activation time.
    #[must_use]
    pub fn all(&self) -> Vec<Alert> {
        let alerts = self.alerts.read();
        let mut all: Vec<_> = alerts.values().cloned().collect();
        all.sort_by_key(|a| (a.active_at, a.fingerprint));
        all
    }

    /// Returns the number of alerts currently held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.alerts.read().len()
    }

    /// Restores alerts from a persisted snapshot.
    ///
    /// Fingerprints are recomputed from the labels; entries whose stored
    /// fingerprint disagrees are re-keyed rather than rejected.
    pub fn hydrate(&self, snapshot: Vec<Alert>) {
        let mut alerts = self.alerts.write();
        for mut alert in snapshot {
            let fingerprint = Fingerprint::of(&alert.labels);
            if fingerprint != alert.fingerprint {
                warn!(
                    stored = %alert.fingerprint,
                    computed = %fingerprint,
                    "snapshot fingerprint mismatch, re-keying alert"
                );
                alert.fingerprint = fingerprint;
            }
            alerts.insert(fingerprint, alert);
        }
        debug!(count = alerts.len(), "hydrated alert state");
    }

    /// Returns a stable-ordered snapshot of all alerts for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Alert> {
        let alerts = self.alerts.read();
        let mut all: Vec<_> = alerts.values().cloned().collect();
        all.sort_by_key(|a| a.fingerprint);
        all
    }
}

impl Clone for AlertStore {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            alerts: Arc::clone(&self.alerts),
        }
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}
