//! Core types shared across metric sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped scalar produced by a metric source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// When the value was observed.
    pub at: DateTime<Utc>,
    /// The observed value.
    pub value: f64,
}

impl Sample {
    /// Creates a sample at the given instant.
    #[must_use]
    pub const fn new(at: DateTime<Utc>, value: f64) -> Self {
        Self { at, value }
    }
}
