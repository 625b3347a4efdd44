//! Builder pattern for constructing blocking registries.
//!
//! The builder supports multiple configuration sources using figment:
//! - Default values
//! - Config files (TOML, YAML, JSON)
//! - Environment variables
//! - Programmatic overrides
//! - CLI arguments via clap

use crate::config::{DuplicatePolicy, GatherConfig};
use crate::error::Result;
use crate::gather::Gatherer;
use crate::registry::BlockingRegistry;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use prometheus::Registry;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Builder for constructing a [`BlockingRegistry`].
///
/// Configuration sources are merged in the following order (later sources override earlier):
/// 1. Default values
/// 2. Config files (in order added)
/// 3. Environment variables
/// 4. Programmatic overrides
///
/// # Examples
///
/// ```ignore
/// use metric_cache::RegistryBuilder;
///
/// let registry = prometheus::Registry::new();
/// let blocking = RegistryBuilder::new()
///     .file("gather.toml")
///     .env_prefix("METRIC_CACHE")
///     .gather_timeout(Duration::from_secs(5))
///     .prometheus_registry(registry.clone())
///     .build(registry)?;
/// ```
pub struct RegistryBuilder {
    figment: Figment,
    prometheus_registry: Option<Registry>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("figment", &self.figment)
            .field(
                "prometheus_registry",
                &self.prometheus_registry.as_ref().map(|_| "<Registry>"),
            )
            .finish()
    }
}

impl RegistryBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(GatherConfig::default())),
            prometheus_registry: None,
        }
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension).
    /// Files are merged in the order they are added.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            // Default to TOML
            _ => self.figment.merge(Toml::file(path)),
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Environment variables are expected in the format `{PREFIX}_{KEY}`,
    /// e.g., `METRIC_CACHE_GATHER_TIMEOUT_MS`, `METRIC_CACHE_DUPLICATE_POLICY`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.figment = self
            .figment
            .merge(Env::prefixed(&format!("{}_", prefix)));
        self
    }

    /// Bound the wait for the gather lock.
    ///
    /// A gather that cannot acquire the lock in time fails with
    /// [`CacheError::Busy`](crate::CacheError::Busy) instead of blocking.
    pub fn gather_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.figment = self
            .figment
            .merge(Serialized::default("gather_timeout_ms", millis));
        self
    }

    /// Set how duplicate family names across sources are handled.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("duplicate_policy", policy));
        self
    }

    /// Evict descriptors not resolved during a `CachedCollector` session.
    pub fn evict_stale(mut self, enabled: bool) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("evict_stale", enabled));
        self
    }

    /// Provide a Prometheus registry for the registry's own metrics.
    ///
    /// This may be the same registry that is later passed to [`RegistryBuilder::build`]
    /// as the base gatherer.
    pub fn prometheus_registry(mut self, registry: Registry) -> Self {
        self.prometheus_registry = Some(registry);
        self
    }

    /// Apply CLI argument overrides.
    ///
    /// This method applies any non-None values from the `GatherArgs` struct.
    pub fn with_cli_args(mut self, args: &GatherArgs) -> Self {
        if let Some(timeout) = args.gather_timeout_ms {
            self.figment = self
                .figment
                .merge(Serialized::default("gather_timeout_ms", timeout));
        }
        if let Some(policy) = args.gather_duplicate_policy {
            self.figment = self
                .figment
                .merge(Serialized::default("duplicate_policy", policy));
        }
        if let Some(evict) = args.gather_evict_stale {
            self.figment = self
                .figment
                .merge(Serialized::default("evict_stale", evict));
        }
        self
    }

    /// Extract the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value has the wrong type.
    pub fn config(&self) -> Result<GatherConfig> {
        let mut config: GatherConfig = self.figment.extract().map_err(Box::new)?;
        config.prometheus_registry = self.prometheus_registry.clone();
        Ok(config)
    }

    /// Build a registry over `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration extraction fails.
    pub fn build<G: Gatherer>(self, base: G) -> Result<BlockingRegistry<G>> {
        let config = self.config()?;
        info!(
            gather_timeout_ms = ?config.gather_timeout_ms,
            duplicate_policy = ?config.duplicate_policy,
            evict_stale = config.evict_stale,
            "building blocking registry"
        );
        Ok(BlockingRegistry::with_config(base, config))
    }
}

/// CLI arguments for gather configuration.
///
/// Use with clap's `Parser` derive macro. These arguments can be applied
/// to a `RegistryBuilder` using `with_cli_args`.
///
/// # Examples
///
/// ```ignore
/// use clap::Parser;
/// use metric_cache::{GatherArgs, RegistryBuilder};
///
/// #[derive(Parser)]
/// struct MyArgs {
///     #[command(flatten)]
///     gather: GatherArgs,
/// }
///
/// let args = MyArgs::parse();
/// let blocking = RegistryBuilder::new()
///     .with_cli_args(&args.gather)
///     .build(prometheus::Registry::new())?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct GatherArgs {
    /// Maximum wait for the gather lock, in milliseconds
    #[arg(long)]
    pub gather_timeout_ms: Option<u64>,

    /// Handling of duplicate metric family names
    #[arg(long, value_enum)]
    pub gather_duplicate_policy: Option<DuplicatePolicy>,

    /// Evict descriptors not resolved during a collection session
    #[arg(long)]
    pub gather_evict_stale: Option<bool>,
}
