//! The vigil daemon: SLO evaluation engine, watchdog heartbeat, and
//! HTTP API.
//!
//! Ticks on a fixed interval, evaluating every configured objective's
//! burn-rate rules against the metric source and walking the results
//! through alert dedup, routing, grouping, silencing, and dispatch.
//! The HTTP API exposes engine health, current alerts and budgets,
//! silence management, and config reload.
//!
//! The library surface exists for the binary and the integration
//! tests; `vigild` normally runs as a process:
//!
//! ```text
//! vigild --config vigil.json --listen 0.0.0.0:9094 --state-dir /var/lib/vigil
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use engine::{
    DispatchItem, DispatchWorker, Engine, EngineHealth, HealthSnapshot, SloStatus, TickSummary,
    BURN_ALERTNAME, WATCHDOG_ALERTNAME, WATCHDOG_SERVICE,
};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::create_router;
pub use state::AppState;
