//! Error types for metric-cache.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when building snapshots or gathering metric families.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Label arity, value kind or descriptor validation failed.
    #[error("invalid metric: {0}")]
    InvalidMetric(String),

    /// The base gatherer failed. Raw collector output is still returned.
    #[error("gather failed: {0}")]
    Gather(String),

    /// The same family name was produced by more than one source.
    #[error("duplicate metric family: {0}")]
    DuplicateFamily(String),

    /// The gather lock could not be acquired within the configured timeout.
    #[error("gather lock busy after {waited:?}")]
    Busy {
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Error registering self-observability metrics.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

impl CacheError {
    /// Build an `InvalidMetric` error from anything printable.
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CacheError::InvalidMetric(msg.into())
    }
}

/// Result type alias for metric-cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
