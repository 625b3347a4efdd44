//! Prometheus metrics describing gather activity.
//!
//! Counters work standalone without a Registry - registration is only needed for
//! exposition. Registering them on the same `prometheus::Registry` that serves as the
//! base gatherer makes a `BlockingRegistry` report on itself.
//!
//! # Usage
//!
//! ```ignore
//! let registry = prometheus::Registry::new();
//! let blocking = RegistryBuilder::new()
//!     .prometheus_registry(registry.clone())
//!     .build(registry)?;
//! ```

use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Metrics recorded by a `BlockingRegistry`.
///
/// Cloned metrics share the same underlying counters.
#[derive(Clone)]
pub struct GatherMetrics {
    // === Counters (cumulative) ===
    /// Successful gathers (including partial ones)
    pub gathers: IntCounter,

    /// Gathers whose base gatherer failed
    pub gather_errors: IntCounter,

    /// Duplicate family names seen across sources
    pub duplicate_families: IntCounter,

    /// Gathers that gave up waiting for the lock
    pub busy: IntCounter,

    // === Gauges (current values) ===
    /// Families returned by the last gather
    pub last_families: IntGauge,

    /// Registered raw collectors
    pub raw_collectors: IntGauge,
}

impl Default for GatherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl GatherMetrics {
    /// Create metrics with the default prefix "metric_cache".
    pub fn new() -> Self {
        Self::with_prefix("metric_cache")
    }

    /// Create metrics with a custom prefix.
    ///
    /// Metric names will be `{prefix}_gathers_total`, `{prefix}_busy_total`, etc.
    /// Characters that are not valid in a metric name are replaced with underscores.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix: String = prefix
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let valid = if i == 0 {
                    c.is_ascii_alphabetic() || c == '_' || c == ':'
                } else {
                    c.is_ascii_alphanumeric() || c == '_' || c == ':'
                };
                if valid {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let counter = |suffix: &str, help: &str| {
            IntCounter::with_opts(Opts::new(format!("{}_{}", prefix, suffix), help))
                .expect("metric creation should not fail")
        };
        let gauge = |suffix: &str, help: &str| {
            IntGauge::with_opts(Opts::new(format!("{}_{}", prefix, suffix), help))
                .expect("metric creation should not fail")
        };

        Self {
            gathers: counter("gathers_total", "Gathers completed, including partial ones"),
            gather_errors: counter(
                "gather_errors_total",
                "Gathers whose base gatherer returned an error",
            ),
            duplicate_families: counter(
                "duplicate_families_total",
                "Duplicate metric family names across sources",
            ),
            busy: counter(
                "gather_busy_total",
                "Gathers that timed out waiting for the gather lock",
            ),
            last_families: gauge(
                "last_gather_families",
                "Metric families returned by the last gather",
            ),
            raw_collectors: gauge("raw_collectors", "Registered raw collectors"),
        }
    }

    /// Register all metrics with a Registry for exposition.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate names).
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.gathers.clone()))?;
        registry.register(Box::new(self.gather_errors.clone()))?;
        registry.register(Box::new(self.duplicate_families.clone()))?;
        registry.register(Box::new(self.busy.clone()))?;
        registry.register(Box::new(self.last_families.clone()))?;
        registry.register(Box::new(self.raw_collectors.clone()))?;
        Ok(())
    }

    /// Record a completed gather.
    #[inline]
    pub fn record_gather(&self, families: usize, failed: bool) {
        self.gathers.inc();
        if failed {
            self.gather_errors.inc();
        }
        self.last_families.set(families as i64);
    }

    #[inline]
    pub fn record_duplicates(&self, count: usize) {
        self.duplicate_families.inc_by(count as u64);
    }

    #[inline]
    pub fn record_busy(&self) {
        self.busy.inc();
    }

    #[inline]
    pub fn set_raw_collectors(&self, count: usize) {
        self.raw_collectors.set(count as i64);
    }
}

impl std::fmt::Debug for GatherMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatherMetrics")
            .field("gathers", &self.gathers.get())
            .field("gather_errors", &self.gather_errors.get())
            .field("duplicate_families", &self.duplicate_families.get())
            .field("busy", &self.busy.get())
            .finish()
    }
}
