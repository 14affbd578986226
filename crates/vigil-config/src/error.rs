//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

use vigil_alerts::AlertError;
use vigil_notify::NotifyError;
use vigil_routing::RoutingError;

/// Errors raised while loading, parsing, or validating a config document.
///
/// Any of these fails the load as a whole. On reload, the previously
/// installed configuration stays active.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid JSON document for the config schema.
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A duration string was not in humane form.
    #[error("invalid duration {input:?}: expected an integer with a ms, s, m, h, or d suffix")]
    InvalidDuration {
        /// The rejected input.
        input: String,
    },

    /// Two SLI definitions share a name.
    #[error("duplicate SLI name: {name}")]
    DuplicateSli {
        /// The repeated name.
        name: String,
    },

    /// Two objectives share a name.
    #[error("duplicate SLO name: {name}")]
    DuplicateSlo {
        /// The repeated name.
        name: String,
    },

    /// Two receivers share a name.
    #[error("duplicate receiver name: {name}")]
    DuplicateReceiver {
        /// The repeated name.
        name: String,
    },

    /// An SLI definition was rejected.
    #[error("invalid SLI {name}: {reason}")]
    InvalidSli {
        /// Name of the offending SLI.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An objective or one of its burn rules was rejected.
    #[error("invalid SLO {name}: {reason}")]
    InvalidSlo {
        /// Name of the offending objective.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An objective references an SLI that is not defined.
    #[error("SLO {slo} references unknown SLI {sli}")]
    UnknownSli {
        /// Name of the referencing objective.
        slo: String,
        /// The missing SLI name.
        sli: String,
    },

    /// The engine section was rejected.
    #[error("invalid engine settings: {reason}")]
    InvalidEngine {
        /// What was wrong with it.
        reason: String,
    },

    /// The route tree failed to compile.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A receiver or one of its channels failed to build.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// An inhibition matcher failed to compile.
    #[error(transparent)]
    Matcher(#[from] AlertError),
}

/// Convenience alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
