//! Operator-created silences.
//!
//! A silence suppresses notification of matching alerts for a bounded time
//! window. Silences expire by time and never need explicit deletion for
//! correctness; [`SilenceStore::expire`] merely ends one early.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AlertError, Result};
use crate::matcher::{compile_all, matches_all, CompiledMatcher, Matcher};

/// A time-bounded suppression of matching alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Silence {
    /// Unique identifier for this silence.
    pub id: String,
    /// Label matchers; alerts matching all of them are silenced.
    pub matchers: Vec<Matcher>,
    /// When the silence starts.
    pub starts_at: DateTime<Utc>,
    /// When the silence ends.
    pub ends_at: DateTime<Utc>,
    /// Who created the silence.
    pub created_by: String,
    /// Comment explaining the silence.
    pub comment: String,
}

impl Silence {
    /// Creates a new silence.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSilence` if the time window is empty or
    /// no matchers are given.
    pub fn new(
        matchers: Vec<Matcher>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        created_by: impl Into<String>,
        comment: impl Into<String>,
    ) -> Result<Self> {
        if ends_at <= starts_at {
            return Err(AlertError::InvalidSilence {
                reason: "silence end time must be after start time".to_string(),
            });
        }
        if matchers.is_empty() {
            return Err(AlertError::InvalidSilence {
                reason: "silence requires at least one matcher".to_string(),
            });
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            matchers,
            starts_at,
            ends_at,
            created_by: created_by.into(),
            comment: comment.into(),
        })
    }

    /// Checks whether the silence is active at the given instant.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at && now < self.ends_at
    }
}

#[derive(Debug, Clone)]
struct StoredSilence {
    silence: Silence,
    compiled: Vec<CompiledMatcher>,
}

/// Thread-safe store of silences with pre-compiled matchers.
#[derive(Debug)]
pub struct SilenceStore {
    silences: Arc<RwLock<HashMap<String, StoredSilence>>>,
}

impl SilenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            silences: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Adds a silence, compiling its matchers.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidMatcher` if any matcher fails to
    /// compile; the silence is not stored in that case.
    pub fn create(&self, silence: Silence) -> Result<Silence> {
        let compiled = compile_all(&silence.matchers)?;

        info!(
            silence_id = %silence.id,
            created_by = %silence.created_by,
            ends_at = %silence.ends_at,
            "created silence"
        );

        let mut silences = self.silences.write();
        silences.insert(
            silence.id.clone(),
            StoredSilence {
                silence: silence.clone(),
                compiled,
            },
        );
        Ok(silence)
    }

    /// Returns a silence by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Silence> {
        self.silences.read().get(id).map(|s| s.silence.clone())
    }

    /// Returns all silences, ordered by start time.
    #[must_use]
    pub fn list(&self) -> Vec<Silence> {
        let silences = self.silences.read();
        let mut all: Vec<_> = silences.values().map(|s| s.silence.clone()).collect();
        all.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        all
    }

    /// Returns the silences active at the given instant.
    #[must_use]
    pub fn active_at(&self, now: DateTime<Utc>) -> Vec<Silence> {
        let silences = self.silences.read();
        silences
            .values()
            .filter(|s| s.silence.is_active_at(now))
            .map(|s| s.silence.clone())
            .collect()
    }

    /// Ends a silence early by truncating its window to `now`.
    ///
    /// Expiring an already-ended silence is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SilenceNotFound` if the ID is unknown.
    pub fn expire(&self, id: &str, now: DateTime<Utc>) -> Result<Silence> {
        let mut silences = self.silences.write();
        let stored = silences
            .get_mut(id)
            .ok_or_else(|| AlertError::SilenceNotFound { id: id.to_string() })?;

        if stored.silence.ends_at > now {
            stored.silence.ends_at = now;
            info!(silence_id = %id, "expired silence");
        }
        Ok(stored.silence.clone())
    }

    /// Drops silences that ended more than `retention` ago.
    pub fn gc(&self, now: DateTime<Utc>, retention: Duration) {
        let retention = chrono::Duration::seconds(retention.as_secs() as i64);
        let mut silences = self.silences.write();
        let before = silences.len();
        silences.retain(|_, s| now.signed_duration_since(s.silence.ends_at) < retention);

        let removed = before - silences.len();
        if removed > 0 {
            debug!(removed, "garbage collected expired silences");
        }
    }

    /// Returns the ID of a silence suppressing the given label set, if any.
    #[must_use]
    pub fn suppressing(
        &self,
        labels: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let silences = self.silences.read();
        silences
            .values()
            .find(|s| s.silence.is_active_at(now) && matches_all(&s.compiled, labels))
            .map(|s| s.silence.id.clone())
    }

    /// Returns the number of silences currently held.
    #[must_use]
    pub fn count(&self) -> usize {
        self.silences.read().len()
    }

    /// Restores silences from a persisted snapshot.
    ///
    /// Silences whose matchers no longer compile are skipped with a
    /// warning rather than failing the whole restore.
    pub fn hydrate(&self, snapshot: Vec<Silence>) {
        let mut silences = self.silences.write();
        for silence in snapshot {
            match compile_all(&silence.matchers) {
                Ok(compiled) => {
                    silences.insert(silence.id.clone(), StoredSilence { silence, compiled });
                }
                Err(e) => {
                    warn!(silence_id = %silence.id, error = %e, "skipping unloadable silence");
                }
            }
        }
        debug!(count = silences.len(), "hydrated silences");
    }

    /// Returns a stable-ordered snapshot of all silences for persistence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Silence> {
        let silences = self.silences.read();
        let mut all: Vec<_> = silences.values().map(|s| s.silence.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl Clone for SilenceStore {
    fn clone(&self) -> Self {
        Self {
            silences: Arc::clone(&self.silences),
        }
    }
}

impl Default for SilenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().unwrap()
    }

    fn hours(h: i64) -> chrono::Duration {
        chrono::Duration::hours(h)
    }

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn test_silence() -> Silence {
        Silence::new(
            vec![Matcher::eq("service", "checkout")],
            t0(),
            t0() + hours(2),
            "oncall",
            "planned maintenance",
        )
        .unwrap()
    }

    mod silence_tests {
        use super::*;

        #[test]
        fn new_silence_gets_unique_id() {
            let a = test_silence();
            let b = test_silence();
            assert_ne!(a.id, b.id);
        }

        #[test]
        fn empty_window_is_rejected() {
            let err = Silence::new(
                vec![Matcher::eq("service", "checkout")],
                t0(),
                t0(),
                "oncall",
                "",
            )
            .unwrap_err();
            assert!(matches!(err, AlertError::InvalidSilence { .. }));
        }

        #[test]
        fn missing_matchers_are_rejected() {
            let err = Silence::new(vec![], t0(), t0() + hours(1), "oncall", "").unwrap_err();
            assert!(matches!(err, AlertError::InvalidSilence { .. }));
        }

        #[test]
        fn activity_window_is_half_open() {
            let silence = test_silence();
            assert!(!silence.is_active_at(t0() - hours(1)));
            assert!(silence.is_active_at(t0()));
            assert!(silence.is_active_at(t0() + hours(1)));
            assert!(!silence.is_active_at(t0() + hours(2)));
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn create_and_suppress() {
            let store = SilenceStore::new();
            let silence = store.create(test_silence()).unwrap();

            let suppressed = store.suppressing(&labels(&[("service", "checkout")]), t0() + hours(1));
            assert_eq!(suppressed, Some(silence.id));

            assert!(store
                .suppressing(&labels(&[("service", "payments")]), t0() + hours(1))
                .is_none());
        }

        #[test]
        fn inactive_silence_does_not_suppress() {
            let store = SilenceStore::new();
            store.create(test_silence()).unwrap();

            assert!(store
                .suppressing(&labels(&[("service", "checkout")]), t0() + hours(3))
                .is_none());
        }

        #[test]
        fn invalid_matcher_is_rejected_at_create() {
            let store = SilenceStore::new();
            let mut silence = test_silence();
            silence.matchers = vec![Matcher::re("service", "(")];

            assert!(store.create(silence).is_err());
            assert_eq!(store.count(), 0);
        }

        #[test]
        fn expire_truncates_window() {
            let store = SilenceStore::new();
            let silence = store.create(test_silence()).unwrap();

            let expired = store.expire(&silence.id, t0() + hours(1)).unwrap();
            assert_eq!(expired.ends_at, t0() + hours(1));

            // Expiring again past the new end is a no-op.
            let again = store.expire(&silence.id, t0() + hours(2)).unwrap();
            assert_eq!(again.ends_at, t0() + hours(1));
        }

        #[test]
        fn expire_unknown_id_fails() {
            let store = SilenceStore::new();
            let err = store.expire("nope", t0()).unwrap_err();
            assert!(matches!(err, AlertError::SilenceNotFound { .. }));
        }

        #[test]
        fn gc_drops_long_expired_silences() {
            let store = SilenceStore::new();
            let silence = store.create(test_silence()).unwrap();
            store.expire(&silence.id, t0()).ok();

            store.gc(t0() + hours(1), Duration::from_secs(7200));
            assert_eq!(store.count(), 1);

            store.gc(t0() + hours(3), Duration::from_secs(7200));
            assert_eq!(store.count(), 0);
        }

        #[test]
        fn list_is_ordered_by_start_time() {
            let store = SilenceStore::new();
            let mut later = test_silence();
            later.starts_at = t0() + hours(1);
            later.ends_at = t0() + hours(3);
            store.create(later).unwrap();
            let earlier = store.create(test_silence()).unwrap();

            let listed = store.list();
            assert_eq!(listed.len(), 2);
            assert_eq!(listed[0].id, earlier.id);
        }

        #[test]
        fn hydrate_skips_uncompilable_silences() {
            let store = SilenceStore::new();
            let good = test_silence();
            let mut bad = test_silence();
            bad.matchers = vec![Matcher::re("service", "(")];

            store.hydrate(vec![good.clone(), bad]);
            assert_eq!(store.count(), 1);
            assert!(store.get(&good.id).is_some());
        }

        #[test]
        fn snapshot_roundtrips_through_hydrate() {
            let store = SilenceStore::new();
            store.create(test_silence()).unwrap();

            let restored = SilenceStore::new();
            restored.hydrate(store.snapshot());
            assert_eq!(restored.count(), 1);
        }
    }
}
