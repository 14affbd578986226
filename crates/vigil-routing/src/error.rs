//! Error types for the vigil-routing crate.

use thiserror::Error;
use vigil_alerts::AlertError;

/// Errors that can occur while compiling a routing tree.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A route names a receiver that is not configured.
    #[error("route references unknown receiver: {receiver}")]
    UnknownReceiver {
        /// The receiver name that could not be resolved.
        receiver: String,
    },

    /// The root route has no receiver to fall back to.
    #[error("root route must name a receiver")]
    MissingRootReceiver,

    /// A route matcher failed to compile.
    #[error(transparent)]
    Matcher(#[from] AlertError),
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;
