//! Configuration for the Vigil alerting engine.
//!
//! A [`ConfigDocument`] is the JSON file as written: SLI definitions,
//! objectives with burn-rate rules, the routing tree, inhibition rules,
//! receivers, and engine settings, with durations in humane form
//! (`"30s"`, `"5m"`, `"1h"`). [`ConfigDocument::validate`] compiles it
//! into an immutable [`CompiledConfig`] snapshot, rejecting the whole
//! document on the first error. [`SharedConfig`] holds the installed
//! snapshot and swaps it atomically on reload, so in-flight evaluation
//! cycles finish under the snapshot they started with.
//!
//! ```
//! use std::sync::Arc;
//!
//! use vigil_config::{ConfigDocument, SharedConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc: ConfigDocument = serde_json::from_str(
//!     r#"{
//!         "slis": [{
//!             "name": "availability",
//!             "service": "api",
//!             "good_query": "good[{{window}}]",
//!             "total_query": "total[{{window}}]"
//!         }],
//!         "slos": [{"name": "api-999", "sli": "availability", "target": 0.999}],
//!         "route": {"receiver": "oncall"},
//!         "receivers": [{"name": "oncall", "channels": []}]
//!     }"#,
//! )?;
//!
//! let shared = SharedConfig::new(Arc::new(doc.validate()?));
//! assert_eq!(shared.current().objectives.len(), 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiled;
pub mod duration;
pub mod error;
pub mod schema;
pub mod shared;

pub use compiled::CompiledConfig;
pub use duration::{format_duration, parse_duration};
pub use error::{ConfigError, Result};
pub use schema::{
    BurnRuleConfig, ConfigDocument, EngineConfig, RouteConfig, SliConfig, SloConfig,
    WatchdogConfig, DEFAULT_MAX_CONCURRENT_EVALUATIONS, DEFAULT_QUERY_TIMEOUT,
    DEFAULT_RESOLVED_RETENTION, DEFAULT_SLI_WINDOW, DEFAULT_TICK_INTERVAL,
};
pub use shared::SharedConfig;
