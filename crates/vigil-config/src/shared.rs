//! Shared handle to the installed configuration.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::compiled::CompiledConfig;

/// Atomically swappable handle to the running configuration.
///
/// Readers take one snapshot per evaluation cycle via [`current`] and
/// keep using it even if a reload installs a newer one mid-cycle; the
/// old snapshot lives as long as someone holds its `Arc`. Clones of the
/// handle share the same slot.
///
/// [`current`]: SharedConfig::current
#[derive(Debug)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<CompiledConfig>>>,
}

impl SharedConfig {
    /// Creates the handle around an initial configuration.
    #[must_use]
    pub fn new(initial: Arc<CompiledConfig>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// The currently installed configuration.
    #[must_use]
    pub fn current(&self) -> Arc<CompiledConfig> {
        Arc::clone(&self.inner.read())
    }

    /// Installs a new configuration for subsequent cycles.
    pub fn install(&self, next: Arc<CompiledConfig>) {
        let mut slot = self.inner.write();
        *slot = next;
        info!(
            slos = slot.objectives.len(),
            receivers = slot.receivers.len(),
            "installed new configuration"
        );
    }
}

impl Clone for SharedConfig {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::schema::ConfigDocument;

    use super::*;

    fn compiled(slo_name: &str) -> Arc<CompiledConfig> {
        let doc: ConfigDocument = serde_json::from_value(json!({
            "slis": [{
                "name": "availability",
                "service": "api",
                "good_query": "good[{{window}}]",
                "total_query": "total[{{window}}]"
            }],
            "slos": [{
                "name": slo_name,
                "sli": "availability",
                "target": 0.99
            }],
            "route": {"receiver": "oncall"},
            "receivers": [{"name": "oncall", "channels": []}]
        }))
        .unwrap();
        Arc::new(doc.validate().unwrap())
    }

    #[test]
    fn current_returns_the_installed_snapshot() {
        let shared = SharedConfig::new(compiled("api-99"));
        assert_eq!(shared.current().objectives[0].name, "api-99");
    }

    #[test]
    fn install_swaps_for_subsequent_readers() {
        let shared = SharedConfig::new(compiled("api-99"));
        shared.install(compiled("api-999"));
        assert_eq!(shared.current().objectives[0].name, "api-999");
    }

    #[test]
    fn in_flight_snapshot_survives_a_swap() {
        let shared = SharedConfig::new(compiled("api-99"));
        let held = shared.current();

        shared.install(compiled("api-999"));

        assert_eq!(held.objectives[0].name, "api-99");
        assert_eq!(shared.current().objectives[0].name, "api-999");
    }

    #[test]
    fn clones_share_the_slot() {
        let shared = SharedConfig::new(compiled("api-99"));
        let clone = shared.clone();

        shared.install(compiled("api-999"));

        assert_eq!(clone.current().objectives[0].name, "api-999");
    }
}
