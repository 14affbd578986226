//! Metric source boundary for the Vigil SLO alerting engine.
//!
//! `vigil-metrics` defines the narrow interface the evaluation engine uses
//! to read service-level indicator data: a [`MetricSource`] answering opaque
//! query expressions with scalars or sample series. Any time-series backend
//! implementing the trait is interchangeable; the engine never touches
//! storage internals.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use vigil_metrics::{InMemoryMetricSource, MetricSource, Sample};
//!
//! let source = InMemoryMetricSource::new();
//! source.record("good_events", Sample::new(Utc::now(), 120.0));
//!
//! // Windowed expressions sum the samples recorded inside the window.
//! let good = source.query("good_events[5m]", Utc::now()).unwrap();
//! assert_eq!(good, 120.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod source;
pub mod types;

// Re-export main types at crate root
pub use error::{QueryError, Result};
pub use source::{InMemoryMetricSource, MetricSource};
pub use types::Sample;
