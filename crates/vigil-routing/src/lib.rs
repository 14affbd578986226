//! Notification routing and grouping.
//!
//! Two halves. [`RouteTree`] walks a compiled matcher tree and decides
//! which receiver an alert belongs to, together with the grouping
//! parameters in force at that node. [`GroupCoordinator`] then batches
//! routed alerts into notification groups and decides when each group
//! is due a notification: after `group_wait` for a brand-new group,
//! after `group_interval` when the group's membership changed, and
//! after `repeat_interval` while it keeps firing unchanged.
//!
//! ```
//! use std::collections::{HashMap, HashSet};
//!
//! use vigil_alerts::Matcher;
//! use vigil_routing::{Route, RouteTree};
//!
//! # fn main() -> Result<(), vigil_routing::RoutingError> {
//! let root = Route {
//!     receiver: Some("infra-chat".to_string()),
//!     children: vec![Route {
//!         matchers: vec![Matcher::eq("severity", "critical")],
//!         receiver: Some("pager".to_string()),
//!         ..Route::default()
//!     }],
//!     ..Route::default()
//! };
//! let known = HashSet::from(["infra-chat".to_string(), "pager".to_string()]);
//! let tree = RouteTree::compile(&root, &known)?;
//!
//! let labels = HashMap::from([
//!     ("alertname".to_string(), "ErrorBudgetBurn".to_string()),
//!     ("severity".to_string(), "critical".to_string()),
//! ]);
//! let decisions = tree.route(&labels);
//! assert_eq!(decisions[0].receiver, "pager");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod group;
pub mod route;

pub use error::{Result, RoutingError};
pub use group::{FlushJob, FlushReason, GroupCoordinator};
pub use route::{
    GroupKey, Route, RouteDecision, RouteTree, DEFAULT_GROUP_INTERVAL, DEFAULT_GROUP_WAIT,
    DEFAULT_REPEAT_INTERVAL,
};
