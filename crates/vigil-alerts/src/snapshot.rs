//! Durable snapshots of alert and silence state.
//!
//! The engine periodically writes its alert and silence state to a JSON
//! file so a restart can resume `for`-duration timers and keep silences
//! instead of re-notifying for everything. Writes go to a temporary
//! sibling file first and are renamed into place, so a crash mid-write
//! leaves the previous snapshot intact.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AlertError, Result};
use crate::silence::Silence;
use crate::types::Alert;

/// A point-in-time capture of alert and silence state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// All tracked alerts, including resolved ones awaiting GC.
    pub alerts: Vec<Alert>,
    /// All known silences, including expired ones awaiting GC.
    pub silences: Vec<Silence>,
}

impl StateSnapshot {
    /// Creates a snapshot taken at `saved_at`.
    #[must_use]
    pub const fn new(saved_at: DateTime<Utc>, alerts: Vec<Alert>, silences: Vec<Silence>) -> Self {
        Self {
            saved_at,
            alerts,
            silences,
        }
    }
}

/// Reads and writes state snapshots at a fixed filesystem path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the most recent snapshot, or `None` if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::StorageError` if the file exists but cannot
    /// be read, or `AlertError::SerializationError` if its contents do
    /// not parse.
    pub fn load(&self) -> Result<Option<StateSnapshot>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot file, starting fresh");
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| AlertError::StorageError {
            reason: format!("read {}: {e}", self.path.display()),
        })?;
        let snapshot: StateSnapshot = serde_json::from_str(&contents)
            .map_err(|e| AlertError::SerializationError(e.to_string()))?;

        info!(
            path = %self.path.display(),
            alerts = snapshot.alerts.len(),
            silences = snapshot.silences.len(),
            saved_at = %snapshot.saved_at,
            "loaded state snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Writes a snapshot atomically via a temporary sibling file.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` if the snapshot cannot
    /// be encoded, or `AlertError::StorageError` if writing or renaming
    /// fails.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AlertError::StorageError {
                    reason: format!("create {}: {e}", parent.display()),
                })?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| AlertError::SerializationError(e.to_string()))?;

        let tmp = self.tmp_path();
        fs::write(&tmp, json).map_err(|e| AlertError::StorageError {
            reason: format!("write {}: {e}", tmp.display()),
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| AlertError::StorageError {
            reason: format!("rename {} -> {}: {e}", tmp.display(), self.path.display()),
        })?;

        debug!(
            path = %self.path.display(),
            alerts = snapshot.alerts.len(),
            silences = snapshot.silences.len(),
            "saved state snapshot"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
