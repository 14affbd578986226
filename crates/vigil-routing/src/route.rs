//! The routing tree: where an alert's notifications go and how they group.
//!
//! Routing walks a matcher tree depth-first. The first child whose
//! matchers all hold wins; a matching child with `continue` set lets
//! later siblings collect the alert as well, so one alert can reach
//! several receivers. An alert matching a node but none of its children
//! stays with that node. Grouping parameters inherit down the tree and
//! can be overridden per node.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use tracing::debug;
use vigil_alerts::{compile_all, matches_all, CompiledMatcher, Matcher};

use crate::error::{Result, RoutingError};

/// Default time a new group waits before its first notification.
pub const DEFAULT_GROUP_WAIT: Duration = Duration::from_secs(30);
/// Default spacing between notifications for a changed group.
pub const DEFAULT_GROUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Default re-notification interval for an unchanged firing group.
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// One node of the routing tree, as configured.
///
/// Unset grouping fields inherit from the parent node; the root falls
/// back to the crate defaults. A node without a receiver delivers to the
/// nearest ancestor that has one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    /// Matchers an alert must satisfy to enter this node.
    pub matchers: Vec<Matcher>,
    /// Receiver for alerts that stop at this node.
    pub receiver: Option<String>,
    /// Label names notifications are grouped by.
    pub group_by: Option<Vec<String>>,
    /// How long a fresh group waits before its first notification.
    pub group_wait: Option<Duration>,
    /// Minimum spacing between notifications for a changed group.
    pub group_interval: Option<Duration>,
    /// Re-notification interval for an unchanged firing group.
    pub repeat_interval: Option<Duration>,
    /// Whether later siblings keep matching after this node matches.
    pub continue_matching: bool,
    /// Child routes, tried in order.
    pub children: Vec<Route>,
}

/// Effective grouping parameters for one routed alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Receiver to deliver to.
    pub receiver: String,
    /// Labels the notification group is keyed by.
    pub group_by: Vec<String>,
    /// Wait before a fresh group's first notification.
    pub group_wait: Duration,
    /// Spacing between notifications for a changed group.
    pub group_interval: Duration,
    /// Re-notification interval while firing unchanged.
    pub repeat_interval: Duration,
}

impl RouteDecision {
    /// Renders the group key for an alert routed by this decision.
    #[must_use]
    pub fn group_key(&self, labels: &HashMap<String, String>) -> GroupKey {
        GroupKey::new(&self.receiver, &self.group_by, labels)
    }

    /// Extracts the group-by label values from an alert's label set.
    ///
    /// Missing labels appear with empty values so every alert of a group
    /// renders the same label block.
    #[must_use]
    pub fn group_labels(&self, labels: &HashMap<String, String>) -> HashMap<String, String> {
        self.group_by
            .iter()
            .map(|name| {
                let value = labels.get(name).cloned().unwrap_or_default();
                (name.clone(), value)
            })
            .collect()
    }
}

/// Canonical identity of a notification group.
///
/// Rendered as `receiver:{name="value",...}` with names sorted, so the
/// same alert set always lands in the same group regardless of label
/// iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    /// Builds the key for a receiver and the alert's group-by values.
    #[must_use]
    pub fn new(receiver: &str, group_by: &[String], labels: &HashMap<String, String>) -> Self {
        let mut names: Vec<&String> = group_by.iter().collect();
        names.sort();
        names.dedup();

        let pairs: Vec<String> = names
            .into_iter()
            .map(|name| {
                let value = labels.get(name).map_or("", String::as_str);
                format!("{name}={value:?}")
            })
            .collect();
        Self(format!("{receiver}:{{{}}}", pairs.join(",")))
    }

    /// The rendered key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A compiled routing tree ready to route label sets.
#[derive(Debug)]
pub struct RouteTree {
    root: CompiledRoute,
}

#[derive(Debug)]
struct CompiledRoute {
    matchers: Vec<CompiledMatcher>,
    continue_matching: bool,
    decision: RouteDecision,
    children: Vec<CompiledRoute>,
}

impl RouteTree {
    /// Compiles a route tree, resolving receivers and matchers.
    ///
    /// # Errors
    ///
    /// Returns `RoutingError::MissingRootReceiver` if the root has no
    /// receiver, `RoutingError::UnknownReceiver` for a receiver name not
    /// in `known_receivers`, or a matcher compilation error.
    pub fn compile(root: &Route, known_receivers: &HashSet<String>) -> Result<Self> {
        let receiver = root
            .receiver
            .clone()
            .ok_or(RoutingError::MissingRootReceiver)?;

        let defaults = RouteDecision {
            receiver,
            group_by: root
                .group_by
                .clone()
                .unwrap_or_else(|| vec!["alertname".to_string()]),
            group_wait: root.group_wait.unwrap_or(DEFAULT_GROUP_WAIT),
            group_interval: root.group_interval.unwrap_or(DEFAULT_GROUP_INTERVAL),
            repeat_interval: root.repeat_interval.unwrap_or(DEFAULT_REPEAT_INTERVAL),
        };

        Ok(Self {
            root: Self::compile_node(root, defaults, known_receivers)?,
        })
    }

    fn compile_node(
        route: &Route,
        inherited: RouteDecision,
        known_receivers: &HashSet<String>,
    ) -> Result<CompiledRoute> {
        let decision = RouteDecision {
            receiver: route.receiver.clone().unwrap_or(inherited.receiver),
            group_by: route.group_by.clone().unwrap_or(inherited.group_by),
            group_wait: route.group_wait.unwrap_or(inherited.group_wait),
            group_interval: route.group_interval.unwrap_or(inherited.group_interval),
            repeat_interval: route.repeat_interval.unwrap_or(inherited.repeat_interval),
        };

        if !known_receivers.contains(&decision.receiver) {
            return Err(RoutingError::UnknownReceiver {
                receiver: decision.receiver,
            });
        }

        let children = route
            .children
            .iter()
            .map(|child| Self::compile_node(child, decision.clone(), known_receivers))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledRoute {
            matchers: compile_all(&route.matchers)?,
            continue_matching: route.continue_matching,
            decision,
            children,
        })
    }

    /// Routes a label set, returning every decision it collects.
    ///
    /// The root matches everything, so the result is never empty.
    #[must_use]
    pub fn route(&self, labels: &HashMap<String, String>) -> Vec<RouteDecision> {
        let mut decisions = Vec::new();
        Self::walk(&self.root, labels, &mut decisions);
        debug!(
            receivers = decisions.len(),
            alertname = %labels.get("alertname").map_or("unknown", String::as_str),
            "routed alert"
        );
        decisions
    }

    /// Descends into `node` (whose matchers already hold). Returns true so
    /// the caller knows the subtree accepted the alert.
    fn walk(
        node: &CompiledRoute,
        labels: &HashMap<String, String>,
        decisions: &mut Vec<RouteDecision>,
    ) -> bool {
        let mut matched_child = false;
        for child in &node.children {
            if !matches_all(&child.matchers, labels) {
                continue;
            }
            Self::walk(child, labels, decisions);
            matched_child = true;
            if !child.continue_matching {
                break;
            }
        }

        if !matched_child {
            decisions.push(node.decision.clone());
        }
        true
    }
}
