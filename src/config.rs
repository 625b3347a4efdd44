//! Configuration types for metric-cache registries.

use std::time::Duration;

use prometheus::Registry;
use serde::{Deserialize, Serialize};

/// What to do when more than one source produces the same family name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep every occurrence without reporting.
    Allow,
    /// Keep every occurrence and log a warning.
    #[default]
    Warn,
    /// Keep the first occurrence and report [`CacheError::DuplicateFamily`](crate::CacheError::DuplicateFamily).
    Reject,
}

/// Configuration for a [`BlockingRegistry`](crate::BlockingRegistry).
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatherConfig {
    /// Maximum time to wait for the gather lock, in milliseconds.
    /// None blocks until the previous result is released.
    #[serde(default)]
    pub gather_timeout_ms: Option<u64>,

    /// Handling of family names produced by more than one source (default: warn)
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Evict descriptors not resolved during a `CachedCollector` session (default: false)
    #[serde(default)]
    pub evict_stale: bool,

    /// Prometheus registry for self-observability metrics.
    /// Not serializable - must be set programmatically.
    #[serde(skip)]
    pub prometheus_registry: Option<Registry>,
}

impl GatherConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The gather lock timeout, if one is configured.
    pub fn gather_timeout(&self) -> Option<Duration> {
        self.gather_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatherConfig::default();
        assert!(config.gather_timeout_ms.is_none());
        assert!(config.gather_timeout().is_none());
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Warn);
        assert!(!config.evict_stale);
        assert!(config.prometheus_registry.is_none());
    }

    #[test]
    fn test_gather_timeout() {
        let config = GatherConfig {
            gather_timeout_ms: Some(250),
            ..Default::default()
        };
        assert_eq!(config.gather_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_deserialize_config() {
        let toml = r#"
            gather_timeout_ms = 500
            duplicate_policy = "reject"
            evict_stale = true
        "#;

        let config: GatherConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.gather_timeout_ms, Some(500));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(config.evict_stale);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: GatherConfig = toml::from_str(r#"duplicate_policy = "allow""#).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Allow);
        assert!(config.gather_timeout_ms.is_none());
    }
}
