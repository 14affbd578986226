//! Error types for the vigil-slo crate.

use thiserror::Error;
use vigil_metrics::QueryError;

/// Errors that can occur during SLO evaluation.
#[derive(Debug, Error)]
pub enum SloError {
    /// The SLI's total counter was zero over the evaluation window.
    ///
    /// Callers must treat this as *unknown*, never as 0% or 100%: a
    /// service with no traffic has neither met nor missed its objective.
    #[error("insufficient data for SLI {sli}: zero total events in window")]
    InsufficientData {
        /// The SLI that produced no data.
        sli: String,
    },

    /// The underlying metric source failed to answer a query.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// An SLI or SLO definition is invalid.
    #[error("invalid definition: {reason}")]
    InvalidDefinition {
        /// Why the definition is invalid.
        reason: String,
    },
}

/// Result type for SLO operations.
pub type Result<T> = std::result::Result<T, SloError>;
