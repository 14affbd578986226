//! Serialized form of the alerting configuration.
//!
//! The document is JSON on disk. Parsing checks shape only; semantic
//! checks (receiver references, window ordering, target bounds) happen
//! in [`ConfigDocument::validate`].

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use vigil_alerts::{InhibitRule, Matcher, Severity};
use vigil_notify::ReceiverConfig;
use vigil_routing::Route;

use crate::error::{ConfigError, Result};

/// Default evaluation window for an SLI that does not set one.
pub const DEFAULT_SLI_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Default spacing between evaluation cycles.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);
/// Default bound on services evaluated concurrently in one cycle.
pub const DEFAULT_MAX_CONCURRENT_EVALUATIONS: usize = 8;
/// Default deadline for one service's metric queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Default time resolved alerts stay queryable before collection.
pub const DEFAULT_RESOLVED_RETENTION: Duration = Duration::from_secs(5 * 60);

fn default_sli_window() -> Duration {
    DEFAULT_SLI_WINDOW
}

fn default_compliance_period() -> Duration {
    vigil_slo::DEFAULT_COMPLIANCE_PERIOD
}

fn default_tick_interval() -> Duration {
    DEFAULT_TICK_INTERVAL
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_EVALUATIONS
}

fn default_query_timeout() -> Duration {
    DEFAULT_QUERY_TIMEOUT
}

fn default_resolved_retention() -> Duration {
    DEFAULT_RESOLVED_RETENTION
}

fn default_true() -> bool {
    true
}

/// Root of the on-disk configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// SLI definitions, referenced from objectives by name.
    pub slis: Vec<SliConfig>,
    /// Objectives to evaluate.
    pub slos: Vec<SloConfig>,
    /// Root of the routing tree.
    pub route: RouteConfig,
    /// Inhibition rules applied before dispatch.
    #[serde(default)]
    pub inhibit_rules: Vec<InhibitRule>,
    /// Receivers the route tree delivers to.
    pub receivers: Vec<ReceiverConfig>,
    /// Engine loop settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ConfigDocument {
    /// Reads and parses a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Self = serde_json::from_str(&raw)?;
        debug!(
            path = %path.display(),
            slis = document.slis.len(),
            slos = document.slos.len(),
            receivers = document.receivers.len(),
            "parsed config document"
        );
        Ok(document)
    }
}

/// One SLI definition as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliConfig {
    /// Unique SLI name.
    pub name: String,
    /// Service the indicator measures.
    pub service: String,
    /// Query counting good events; may contain `{{window}}`.
    pub good_query: String,
    /// Query counting total events; may contain `{{window}}`.
    pub total_query: String,
    /// Default evaluation window.
    #[serde(default = "default_sli_window", with = "crate::duration::humane")]
    pub window: Duration,
}

/// One objective as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloConfig {
    /// Unique objective name.
    pub name: String,
    /// Name of the SLI this objective evaluates.
    pub sli: String,
    /// Target success ratio, exclusive between 0 and 1.
    pub target: f64,
    /// Budget accounting period.
    #[serde(
        default = "default_compliance_period",
        with = "crate::duration::humane"
    )]
    pub compliance_period: Duration,
    /// Burn-rate rules; empty means the stock fast/slow pair.
    #[serde(default)]
    pub burn_rules: Vec<BurnRuleConfig>,
}

/// One burn-rate rule as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRuleConfig {
    /// Short confirmation window.
    #[serde(with = "crate::duration::humane")]
    pub short_window: Duration,
    /// Long detection window.
    #[serde(with = "crate::duration::humane")]
    pub long_window: Duration,
    /// Burn-rate factor both windows must exceed.
    pub factor: f64,
    /// Severity of the resulting alert.
    #[serde(default)]
    pub severity: Severity,
    /// Extra hold before a pending alert starts firing.
    #[serde(
        default,
        rename = "for",
        with = "crate::duration::humane_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub hold_for: Option<Duration>,
}

/// One routing node as configured.
///
/// Mirrors [`Route`] with humane duration strings and the document's
/// `continue` spelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Matchers an alert must satisfy to enter this node.
    #[serde(default)]
    pub matchers: Vec<Matcher>,
    /// Receiver for alerts that stop at this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Label names notifications are grouped by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    /// Wait before a fresh group's first notification.
    #[serde(
        default,
        with = "crate::duration::humane_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_wait: Option<Duration>,
    /// Spacing between notifications for a changed group.
    #[serde(
        default,
        with = "crate::duration::humane_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_interval: Option<Duration>,
    /// Re-notification interval while firing unchanged.
    #[serde(
        default,
        with = "crate::duration::humane_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub repeat_interval: Option<Duration>,
    /// Whether later siblings keep matching after this node matches.
    #[serde(default, rename = "continue")]
    pub continue_matching: bool,
    /// Child routes, tried in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteConfig>,
}

impl RouteConfig {
    /// Converts the node and its children into the routing crate's form.
    #[must_use]
    pub fn to_route(&self) -> Route {
        Route {
            matchers: self.matchers.clone(),
            receiver: self.receiver.clone(),
            group_by: self.group_by.clone(),
            group_wait: self.group_wait,
            group_interval: self.group_interval,
            repeat_interval: self.repeat_interval,
            continue_matching: self.continue_matching,
            children: self.children.iter().map(Self::to_route).collect(),
        }
    }
}

/// Evaluation loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Spacing between evaluation cycles.
    #[serde(default = "default_tick_interval", with = "crate::duration::humane")]
    pub tick_interval: Duration,
    /// Bound on services evaluated concurrently in one cycle.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_evaluations: usize,
    /// Deadline for one service's metric queries.
    #[serde(default = "default_query_timeout", with = "crate::duration::humane")]
    pub query_timeout: Duration,
    /// How long resolved alerts stay queryable.
    #[serde(
        default = "default_resolved_retention",
        with = "crate::duration::humane"
    )]
    pub resolved_retention: Duration,
    /// Dead man's switch settings.
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_concurrent_evaluations: DEFAULT_MAX_CONCURRENT_EVALUATIONS,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            resolved_retention: DEFAULT_RESOLVED_RETENTION,
            watchdog: WatchdogConfig::default(),
        }
    }
}

/// Dead man's switch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Whether the always-firing heartbeat alert is injected each tick.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
