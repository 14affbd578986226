//! Error types for the notification layer.

use thiserror::Error;

/// Errors raised while building receivers or delivering notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A receiver definition failed validation.
    #[error("invalid receiver: {reason}")]
    InvalidReceiver {
        /// Why the receiver was rejected.
        reason: String,
    },

    /// A channel configuration failed validation.
    #[error("invalid channel config: {reason}")]
    InvalidChannel {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// A channel rejected a delivery attempt.
    ///
    /// The dispatcher retries these per its policy before giving up.
    #[error("delivery via {channel} failed: {reason}")]
    Delivery {
        /// The channel that rejected the send.
        channel: String,
        /// The channel's failure description.
        reason: String,
    },
}

/// Convenience result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
