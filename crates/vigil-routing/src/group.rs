//! Notification group lifecycle and flush scheduling.
//!
//! One coordinator owns every group's timers through a single min-heap of
//! wakeup deadlines; there is no task or thread per group. A fresh group
//! first flushes `group_wait` after its first alert, then wakes on the
//! `group_interval` cadence. At each wake it flushes if membership or
//! alert state changed since the last flush, re-notifies if the group has
//! been firing unchanged for `repeat_interval`, and otherwise goes back
//! to sleep. Members whose resolution has been flushed are dropped; a
//! group with no members left is dropped with them.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use vigil_alerts::Fingerprint;

use crate::route::{GroupKey, RouteDecision};

/// Why a group flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// First notification for a new group.
    GroupWait,
    /// Group membership or alert state changed since the last flush.
    GroupInterval,
    /// Unchanged firing group re-notified after `repeat_interval`.
    RepeatInterval,
}

/// A batch of alerts due for notification.
///
/// Carries fingerprints rather than alert snapshots: the dispatcher
/// resolves current state from the alert store at send time, so a flush
/// never delivers stale values.
#[derive(Debug, Clone)]
pub struct FlushJob {
    /// The group being flushed.
    pub group_key: GroupKey,
    /// Receiver to deliver to.
    pub receiver: String,
    /// The group's identifying label values.
    pub group_labels: HashMap<String, String>,
    /// Members of the group, in insertion order by fingerprint.
    pub fingerprints: Vec<Fingerprint>,
    /// Why the flush happened.
    pub reason: FlushReason,
}

#[derive(Debug)]
struct GroupState {
    receiver: String,
    group_labels: HashMap<String, String>,
    // Ordered so flush batches render deterministically.
    members: BTreeMap<Fingerprint, MemberState>,
    group_interval: chrono::Duration,
    repeat_interval: chrono::Duration,
    next_wake: DateTime<Utc>,
    generation: u64,
    flushed_generation: Option<u64>,
    last_flush_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberState {
    Active,
    Resolved,
}

#[derive(Debug, Default)]
struct Inner {
    groups: HashMap<GroupKey, GroupState>,
    schedule: BinaryHeap<Reverse<(DateTime<Utc>, GroupKey)>>,
}

/// Owns all notification groups and their flush timers.
#[derive(Debug, Default)]
pub struct GroupCoordinator {
    inner: Arc<RwLock<Inner>>,
}

impl GroupCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an alert in its group, creating the group on first sight.
    ///
    /// Called for firing transitions with `resolved = false` and for
    /// resolution transitions with `resolved = true`. Every call that
    /// changes the group's state bumps its change generation, which is
    /// what makes the next wake actually flush.
    pub fn track(
        &self,
        decision: &RouteDecision,
        labels: &HashMap<String, String>,
        fingerprint: Fingerprint,
        resolved: bool,
        now: DateTime<Utc>,
    ) {
        let key = decision.group_key(labels);
        let member = if resolved {
            MemberState::Resolved
        } else {
            MemberState::Active
        };

        let mut inner = self.inner.write();
        if let Some(group) = inner.groups.get_mut(&key) {
            if group.members.insert(fingerprint, member) != Some(member) {
                group.generation += 1;
            }
            return;
        }

        let wake = now + chrono_duration(decision.group_wait);
        let mut members = BTreeMap::new();
        members.insert(fingerprint, member);
        inner.groups.insert(
            key.clone(),
            GroupState {
                receiver: decision.receiver.clone(),
                group_labels: decision.group_labels(labels),
                members,
                group_interval: chrono_duration(decision.group_interval),
                repeat_interval: chrono_duration(decision.repeat_interval),
                next_wake: wake,
                generation: 1,
                flushed_generation: None,
                last_flush_at: None,
            },
        );
        inner.schedule.push(Reverse((wake, key.clone())));
        debug!(group = %key, wake = %wake, "created notification group");
    }

    /// Collects every flush that is due at `now`.
    ///
    /// Waking a group does not imply notifying: an unchanged group inside
    /// its repeat interval goes straight back to sleep, so the same group
    /// state is never flushed twice.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<FlushJob> {
        let mut jobs = Vec::new();
        let mut inner = self.inner.write();

        loop {
            match inner.schedule.peek() {
                Some(Reverse((wake, _))) if *wake <= now => {}
                _ => break,
            }
            let Some(Reverse((wake, key))) = inner.schedule.pop() else {
                break;
            };

            let Some(group) = inner.groups.get_mut(&key) else {
                // Group was dropped or re-keyed; stale schedule entry.
                continue;
            };
            if group.next_wake != wake {
                continue;
            }

            if let Some(reason) = Self::flush_reason(group, now) {
                jobs.push(FlushJob {
                    group_key: key.clone(),
                    receiver: group.receiver.clone(),
                    group_labels: group.group_labels.clone(),
                    fingerprints: group.members.keys().copied().collect(),
                    reason,
                });
                group.flushed_generation = Some(group.generation);
                group.last_flush_at = Some(now);

                // Resolved members have had their resolution delivered.
                group
                    .members
                    .retain(|_, state| *state == MemberState::Active);
            }

            if group.members.is_empty() {
                inner.groups.remove(&key);
                debug!(group = %key, "dropped empty notification group");
                continue;
            }

            let next = now + group.group_interval;
            group.next_wake = next;
            inner.schedule.push(Reverse((next, key)));
        }

        jobs
    }

    fn flush_reason(group: &GroupState, now: DateTime<Utc>) -> Option<FlushReason> {
        if group.flushed_generation.is_none() {
            return Some(FlushReason::GroupWait);
        }
        if group.flushed_generation != Some(group.generation) {
            return Some(FlushReason::GroupInterval);
        }

        let firing = group
            .members
            .values()
            .any(|state| *state == MemberState::Active);
        let repeat_due = group
            .last_flush_at
            .is_none_or(|last| now.signed_duration_since(last) >= group.repeat_interval);
        if firing && repeat_due {
            return Some(FlushReason::RepeatInterval);
        }
        None
    }

    /// When the earliest group wake is scheduled, if any.
    #[must_use]
    pub fn next_wake(&self) -> Option<DateTime<Utc>> {
        self.inner
            .read()
            .groups
            .values()
            .map(|g| g.next_wake)
            .min()
    }

    /// Number of live groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.inner.read().groups.len()
    }

    /// Drops all groups and their schedules.
    ///
    /// Used on config reload: the route tree (and with it the group keys)
    /// may have changed, so the engine re-tracks every firing alert under
    /// the new tree. Stale heap entries are ignored when they surface.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let dropped = inner.groups.len();
        inner.groups.clear();
        if dropped > 0 {
            debug!(dropped, "cleared notification groups for re-keying");
        }
    }
}

impl Clone for GroupCoordinator {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn chrono_duration(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::seconds(d.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().unwrap()
    }

    fn seconds(s: i64) -> chrono::Duration {
        chrono::Duration::seconds(s)
    }

    fn decision(receiver: &str) -> RouteDecision {
        RouteDecision {
            receiver: receiver.to_string(),
            group_by: vec!["alertname".to_string(), "service".to_string()],
            group_wait: Duration::from_secs(30),
            group_interval: Duration::from_secs(300),
            repeat_interval: Duration::from_secs(3600),
        }
    }

    fn labels(service: &str) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), "HighBurn".to_string());
        labels.insert("service".to_string(), service.to_string());
        labels
    }

    fn fingerprint(n: u64) -> Fingerprint {
        let mut labels = HashMap::new();
        labels.insert("n".to_string(), n.to_string());
        Fingerprint::of(&labels)
    }

    mod flush_schedule_tests {
        use super::*;

        #[test]
        fn new_group_flushes_after_group_wait() {
            let coordinator = GroupCoordinator::new();
            coordinator.track(&decision("pager"), &labels("checkout"), fingerprint(1), false, t0());

            // Not due before group_wait elapses.
            assert!(coordinator.due(t0() + seconds(10)).is_empty());

            let jobs = coordinator.due(t0() + seconds(30));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].reason, FlushReason::GroupWait);
            assert_eq!(jobs[0].receiver, "pager");
            assert_eq!(jobs[0].fingerprints, vec![fingerprint(1)]);
        }

        #[test]
        fn alerts_joining_before_group_wait_batch_together() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            coordinator.track(&d, &labels("checkout"), fingerprint(2), false, t0() + seconds(5));

            let jobs = coordinator.due(t0() + seconds(30));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].fingerprints.len(), 2);
        }

        #[test]
        fn unchanged_group_does_not_reflush_within_interval() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            // Wake at the next interval with no changes: silent.
            assert!(coordinator.due(t0() + seconds(330)).is_empty());
            assert_eq!(coordinator.group_count(), 1);
        }

        #[test]
        fn changed_group_reflushes_at_group_interval() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            // A new member arrives right after the first flush.
            coordinator.track(&d, &labels("checkout"), fingerprint(2), false, t0() + seconds(40));

            // Still silent before the interval boundary.
            assert!(coordinator.due(t0() + seconds(100)).is_empty());

            let jobs = coordinator.due(t0() + seconds(330));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].reason, FlushReason::GroupInterval);
            assert_eq!(jobs[0].fingerprints.len(), 2);
        }

        #[test]
        fn repeated_track_of_same_state_is_idempotent() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            // The engine re-tracks the same firing alert every tick.
            for tick in 1..=8 {
                coordinator.track(
                    &d,
                    &labels("checkout"),
                    fingerprint(1),
                    false,
                    t0() + seconds(30 + tick * 30),
                );
            }

            // No state change: the interval wake stays silent.
            assert!(coordinator.due(t0() + seconds(330)).is_empty());
        }

        #[test]
        fn firing_group_renotifies_after_repeat_interval() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            // Walk the interval wakes across the repeat horizon.
            let mut repeats = 0;
            for minute in 1..=70 {
                for job in coordinator.due(t0() + seconds(minute * 60)) {
                    assert_eq!(job.reason, FlushReason::RepeatInterval);
                    repeats += 1;
                }
            }
            // One hour repeat interval: exactly one re-notification.
            assert_eq!(repeats, 1);
        }

        #[test]
        fn groups_with_different_keys_flush_independently() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            coordinator.track(&d, &labels("payments"), fingerprint(2), false, t0() + seconds(15));

            let first = coordinator.due(t0() + seconds(30));
            assert_eq!(first.len(), 1);
            assert_eq!(first[0].group_labels.get("service").map(String::as_str), Some("checkout"));

            let second = coordinator.due(t0() + seconds(45));
            assert_eq!(second.len(), 1);
            assert_eq!(second[0].group_labels.get("service").map(String::as_str), Some("payments"));
        }
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn resolution_flushes_and_drops_the_group() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            coordinator.track(&d, &labels("checkout"), fingerprint(1), true, t0() + seconds(60));

            let jobs = coordinator.due(t0() + seconds(330));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].reason, FlushReason::GroupInterval);
            assert_eq!(jobs[0].fingerprints, vec![fingerprint(1)]);

            // Resolution delivered; the group is gone and stays silent.
            assert_eq!(coordinator.group_count(), 0);
            assert!(coordinator.due(t0() + seconds(4000)).is_empty());
        }

        #[test]
        fn partially_resolved_group_keeps_firing_members() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            coordinator.track(&d, &labels("checkout"), fingerprint(2), false, t0());
            assert_eq!(coordinator.due(t0() + seconds(30)).len(), 1);

            coordinator.track(&d, &labels("checkout"), fingerprint(1), true, t0() + seconds(60));

            let jobs = coordinator.due(t0() + seconds(330));
            assert_eq!(jobs[0].fingerprints.len(), 2);

            // Only the firing member remains afterwards.
            assert_eq!(coordinator.group_count(), 1);
            let next = coordinator.due(t0() + seconds(330 + 3600));
            assert_eq!(next.len(), 1);
            assert_eq!(next[0].reason, FlushReason::RepeatInterval);
            assert_eq!(next[0].fingerprints, vec![fingerprint(2)]);
        }

        #[test]
        fn resolved_before_first_flush_still_notifies_once() {
            // Fired and resolved within group_wait: the single flush
            // carries the resolution.
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            coordinator.track(&d, &labels("checkout"), fingerprint(1), true, t0() + seconds(10));

            let jobs = coordinator.due(t0() + seconds(30));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].reason, FlushReason::GroupWait);
            assert_eq!(coordinator.group_count(), 0);
        }
    }

    mod rekey_tests {
        use super::*;

        #[test]
        fn clear_drops_groups_and_ignores_stale_schedule() {
            let coordinator = GroupCoordinator::new();
            let d = decision("pager");
            coordinator.track(&d, &labels("checkout"), fingerprint(1), false, t0());
            coordinator.clear();
            assert_eq!(coordinator.group_count(), 0);

            // The old heap entry surfaces and is discarded harmlessly.
            assert!(coordinator.due(t0() + seconds(30)).is_empty());

            // Re-tracking under a new decision creates a fresh group.
            let mut rerouted = decision("chat");
            rerouted.group_by = vec!["service".to_string()];
            coordinator.track(&rerouted, &labels("checkout"), fingerprint(1), false, t0() + seconds(60));

            let jobs = coordinator.due(t0() + seconds(90));
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].receiver, "chat");
        }
    }
}
