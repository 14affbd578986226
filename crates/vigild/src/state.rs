//! Shared state behind the HTTP API handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vigil_config::SharedConfig;
use vigil_notify::DispatcherStats;

use crate::engine::Engine;

/// Everything the API handlers need, cheap to clone per request.
#[derive(Debug, Clone)]
pub struct AppState {
    config_path: PathBuf,
    config: SharedConfig,
    engine: Arc<Engine>,
    stats: Arc<DispatcherStats>,
}

impl AppState {
    /// Creates the handler state.
    #[must_use]
    pub fn new(
        config_path: impl Into<PathBuf>,
        config: SharedConfig,
        engine: Arc<Engine>,
        stats: Arc<DispatcherStats>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            config,
            engine,
            stats,
        }
    }

    /// The file path `POST /api/reload` re-reads.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The active configuration slot.
    #[must_use]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// The evaluation engine.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Notification dispatch counters.
    #[must_use]
    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }
}
