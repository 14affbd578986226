//! Error types for the vigil-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alerting core.
#[derive(Debug, Error)]
pub enum AlertError {
    /// A label matcher could not be compiled.
    #[error("invalid matcher: {reason}")]
    InvalidMatcher {
        /// Why the matcher is invalid.
        reason: String,
    },

    /// A silence definition is invalid.
    #[error("invalid silence: {reason}")]
    InvalidSilence {
        /// Why the silence is invalid.
        reason: String,
    },

    /// A silence with the given ID was not found.
    #[error("silence not found: {id}")]
    SilenceNotFound {
        /// The silence ID that was not found.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// State snapshot persistence failed.
    #[error("storage error: {reason}")]
    StorageError {
        /// Why the storage operation failed.
        reason: String,
    },
}

/// Result type for alerting operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_invalid_matcher() {
        let err = AlertError::InvalidMatcher {
            reason: "bad regex".to_string(),
        };
        assert_eq!(err.to_string(), "invalid matcher: bad regex");
    }

    #[test]
    fn error_display_silence_not_found() {
        let err = AlertError::SilenceNotFound {
            id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "silence not found: abc-123");
    }

    #[test]
    fn error_display_storage_error() {
        let err = AlertError::StorageError {
            reason: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
