//! Alert lifecycle, label matching, silences and inhibition for Vigil.
//!
//! This crate owns the alerting core that sits between burn-rate
//! evaluation and notification routing: deduplicating alerts by label
//! fingerprint, walking them through pending / firing / resolved,
//! filtering them through silences and inhibition rules, and persisting
//! the whole state across restarts.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::time::Duration;
//! use chrono::Utc;
//! use vigil_alerts::{AlertStore, Observation, TransitionKind};
//!
//! let store = AlertStore::new();
//! let mut labels = HashMap::new();
//! labels.insert("alertname".to_string(), "HighBurnRate".to_string());
//! labels.insert("service".to_string(), "checkout".to_string());
//!
//! let now = Utc::now();
//! let obs = Observation {
//!     labels,
//!     annotations: HashMap::new(),
//!     value: 16.2,
//!     for_duration: Duration::from_secs(0),
//!     active: true,
//! };
//!
//! // With a zero `for` duration the alert fires on first observation.
//! let transition = store.observe(obs, now).unwrap();
//! assert_eq!(transition.kind, TransitionKind::Fired);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod inhibit;
pub mod matcher;
pub mod silence;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::{AlertError, Result};
pub use inhibit::{compile_rules, filter_notifiable, CompiledInhibitRule, InhibitRule};
pub use matcher::{compile_all, matches_all, CompiledMatcher, MatchOp, Matcher};
pub use silence::{Silence, SilenceStore};
pub use snapshot::{SnapshotStore, StateSnapshot};
pub use store::{AlertStore, AlertStoreConfig, Observation, Transition, TransitionKind};
pub use types::{
    Alert, AlertState, Fingerprint, Severity, LABEL_ALERTNAME, LABEL_SERVICE, LABEL_SEVERITY,
};
