//! Core types for the alerting system.
//!
//! This module provides the fundamental types used throughout the
//! vigil-alerts crate:
//! - [`Severity`]: The severity level of an alert
//! - [`AlertState`]: The lifecycle state of an alert
//! - [`Fingerprint`]: The deduplication key derived from a label set
//! - [`Alert`]: An active or resolved alert instance

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label carrying the alert's name.
pub const LABEL_ALERTNAME: &str = "alertname";
/// Label carrying the alert's severity.
pub const LABEL_SEVERITY: &str = "severity";
/// Label carrying the originating service.
pub const LABEL_SERVICE: &str = "service";

/// The severity level of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational alert, no action required.
    Info,
    /// Warning alert, should be investigated.
    #[default]
    Warning,
    /// Critical alert, requires immediate attention.
    Critical,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// Returns the priority of this severity (higher = more urgent).
    #[must_use]
    pub const fn priority(&self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The current lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// The condition is true but hasn't been true long enough to fire.
    Pending,
    /// The alert is actively firing.
    Firing,
    /// The alert was active but its condition has cleared.
    Resolved,
}

impl AlertState {
    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }

    /// Returns true if the alert is currently active (pending or firing).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Firing)
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deduplication key for an alert, derived from its full label set.
///
/// Two evaluation cycles producing the same label set map to the same
/// fingerprint and therefore to the same [`Alert`] object. The observed
/// value is deliberately not part of the hash, so value refreshes never
/// re-key an alert.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Computes the fingerprint of a label set.
    #[must_use]
    pub fn of(labels: &HashMap<String, String>) -> Self {
        use std::hash::{Hash, Hasher};

        let mut hasher = std::collections::hash_map::DefaultHasher::new();

        // Sort labels for consistent hashing
        let mut sorted_labels: Vec<_> = labels.iter().collect();
        sorted_labels.sort_by_key(|(k, _)| *k);
        for (k, v) in sorted_labels {
            k.hash(&mut hasher);
            v.hash(&mut hasher);
        }

        Self(hasher.finish())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An active or resolved alert instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Deduplication key derived from the label set.
    pub fingerprint: Fingerprint,
    /// Labels identifying the alert (always includes `alertname`).
    pub labels: HashMap<String, String>,
    /// Annotations providing human-readable context.
    pub annotations: HashMap<String, String>,
    /// The current lifecycle state.
    pub state: AlertState,
    /// The last observed value (burn rate or ratio).
    pub value: f64,
    /// When the alert first became pending in the current cycle.
    pub active_at: DateTime<Utc>,
    /// When the alert started firing (None while pending).
    pub fired_at: Option<DateTime<Utc>>,
    /// When the alert was resolved (None while active).
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Creates a new pending alert from a label set.
    #[must_use]
    pub fn pending(
        labels: HashMap<String, String>,
        annotations: HashMap<String, String>,
        value: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let fingerprint = Fingerprint::of(&labels);
        Self {
            fingerprint,
            labels,
            annotations,
            state: AlertState::Pending,
            value,
            active_at: now,
            fired_at: None,
            resolved_at: None,
        }
    }

    /// Transitions the alert to the firing state.
    pub fn fire(&mut self, now: DateTime<Utc>) {
        if self.state == AlertState::Pending {
            self.state = AlertState::Firing;
            self.fired_at = Some(now);
        }
    }

    /// Transitions the alert to the resolved state.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        if self.state != AlertState::Resolved {
            self.state = AlertState::Resolved;
            self.resolved_at = Some(now);
        }
    }

    /// Updates the observed value without touching lifecycle timestamps.
    pub fn refresh(&mut self, value: f64) {
        self.value = value;
    }

    /// Returns true if the alert is currently active (pending or firing).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Returns the value of a label, if present.
    #[must_use]
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Returns the alert's name (the `alertname` label).
    #[must_use]
    pub fn name(&self) -> &str {
        self.label(LABEL_ALERTNAME).unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    mod severity_tests {
        use super::*;

        #[test]
        fn severity_as_str() {
            assert_eq!(Severity::Info.as_str(), "info");
            assert_eq!(Severity::Warning.as_str(), "warning");
            assert_eq!(Severity::Critical.as_str(), "critical");
        }

        #[test]
        fn severity_priority_ordering() {
            assert!(Severity::Info.priority() < Severity::Warning.priority());
            assert!(Severity::Warning.priority() < Severity::Critical.priority());
        }

        #[test]
        fn severity_default_is_warning() {
            assert_eq!(Severity::default(), Severity::Warning);
        }

        #[test]
        fn severity_serializes_lowercase() {
            let json = serde_json::to_string(&Severity::Critical).unwrap();
            assert_eq!(json, "\"critical\"");
        }
    }

    mod state_tests {
        use super::*;

        #[test]
        fn state_is_active() {
            assert!(AlertState::Pending.is_active());
            assert!(AlertState::Firing.is_active());
            assert!(!AlertState::Resolved.is_active());
        }

        #[test]
        fn state_display() {
            assert_eq!(format!("{}", AlertState::Pending), "pending");
            assert_eq!(format!("{}", AlertState::Firing), "firing");
            assert_eq!(format!("{}", AlertState::Resolved), "resolved");
        }
    }

    mod fingerprint_tests {
        use super::*;

        #[test]
        fn same_labels_same_fingerprint() {
            let a = labels(&[("alertname", "HighBurn"), ("service", "api")]);
            let b = labels(&[("service", "api"), ("alertname", "HighBurn")]);
            assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
        }

        #[test]
        fn different_labels_different_fingerprint() {
            let a = labels(&[("alertname", "HighBurn"), ("service", "api")]);
            let b = labels(&[("alertname", "HighBurn"), ("service", "web")]);
            assert_ne!(Fingerprint::of(&a), Fingerprint::of(&b));
        }

        #[test]
        fn fingerprint_renders_as_hex() {
            let fp = Fingerprint::of(&labels(&[("alertname", "X")]));
            let rendered = fp.to_string();
            assert_eq!(rendered.len(), 16);
            assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
        }

        proptest! {
            #[test]
            fn fingerprint_is_insertion_order_independent(
                // Unique keys only: with a duplicate key, forward and
                // reversed insertion collapse to different maps, and the
                // property ranges over label maps, not pair lists.
                pairs in prop::collection::vec(("[a-z]{1,8}", "[a-z0-9]{1,8}"), 1..8)
                    .prop_filter("label keys must be unique", |pairs| {
                        pairs
                            .iter()
                            .map(|(k, _)| k)
                            .collect::<std::collections::HashSet<_>>()
                            .len()
                            == pairs.len()
                    })
            ) {
                let forward: HashMap<String, String> = pairs.iter().cloned().collect();
                let reversed: HashMap<String, String> =
                    pairs.iter().rev().cloned().collect();
                prop_assert_eq!(Fingerprint::of(&forward), Fingerprint::of(&reversed));
            }
        }
    }

    mod alert_tests {
        use super::*;

        fn test_alert() -> Alert {
            Alert::pending(
                labels(&[
                    ("alertname", "HighErrorBudgetBurn"),
                    ("severity", "critical"),
                    ("service", "checkout"),
                ]),
                labels(&[("summary", "budget burning fast")]),
                14.8,
                Utc::now(),
            )
        }

        #[test]
        fn new_alert_is_pending() {
            let alert = test_alert();
            assert_eq!(alert.state, AlertState::Pending);
            assert!(alert.fired_at.is_none());
            assert!(alert.resolved_at.is_none());
            assert!(alert.is_active());
        }

        #[test]
        fn fire_sets_fired_at() {
            let mut alert = test_alert();
            let now = Utc::now();
            alert.fire(now);
            assert_eq!(alert.state, AlertState::Firing);
            assert_eq!(alert.fired_at, Some(now));
        }

        #[test]
        fn resolve_sets_resolved_at() {
            let mut alert = test_alert();
            let now = Utc::now();
            alert.fire(now);
            alert.resolve(now);
            assert_eq!(alert.state, AlertState::Resolved);
            assert_eq!(alert.resolved_at, Some(now));
            assert!(!alert.is_active());
        }

        #[test]
        fn fire_from_resolved_is_ignored() {
            let mut alert = test_alert();
            let now = Utc::now();
            alert.fire(now);
            alert.resolve(now);
            alert.fire(now);
            assert_eq!(alert.state, AlertState::Resolved);
        }

        #[test]
        fn refresh_does_not_change_fingerprint_or_timestamps() {
            let mut alert = test_alert();
            let fp = alert.fingerprint;
            let active_at = alert.active_at;
            alert.refresh(20.1);
            assert_eq!(alert.fingerprint, fp);
            assert_eq!(alert.active_at, active_at);
            assert!((alert.value - 20.1).abs() < f64::EPSILON);
        }

        #[test]
        fn name_falls_back_when_alertname_missing() {
            let alert = Alert::pending(labels(&[("service", "api")]), HashMap::new(), 0.0, Utc::now());
            assert_eq!(alert.name(), "unknown");
        }

        #[test]
        fn alert_roundtrips_through_json() {
            let alert = test_alert();
            let json = serde_json::to_string(&alert).unwrap();
            let back: Alert = serde_json::from_str(&json).unwrap();
            assert_eq!(back, alert);
        }
    }
}
