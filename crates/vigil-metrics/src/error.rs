//! Error types for the vigil-metrics crate.

use thiserror::Error;

/// Errors produced by a metric source.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The metric source could not be reached.
    #[error("metric source unreachable: {reason}")]
    Unreachable {
        /// Why the source could not be reached.
        reason: String,
    },

    /// The expression evaluated to something that is not a scalar.
    #[error("non-numeric result for query: {expr}")]
    NonNumeric {
        /// The expression that produced the result.
        expr: String,
    },

    /// The query did not complete within its deadline.
    #[error("query timed out after {deadline_ms}ms: {expr}")]
    Timeout {
        /// The expression that timed out.
        expr: String,
        /// The deadline that was exceeded, in milliseconds.
        deadline_ms: u64,
    },

    /// The expression could not be parsed or is otherwise invalid.
    #[error("bad query expression {expr:?}: {reason}")]
    BadExpression {
        /// The offending expression.
        expr: String,
        /// Why the expression was rejected.
        reason: String,
    },
}

/// Result type for metric source operations.
pub type Result<T> = std::result::Result<T, QueryError>;
