//! Blocking registry: managed families merged with raw collector output.
//!
//! # Lock Lifetime
//!
//! ```text
//! gather() ──► base.gather()          (unlocked, caller-owned copy)
//!          ──► lock.lock()  ─────────────────────────────┐
//!          ──► raw.collect_into() for each raw collector │ held while the
//!          ──► sort by name, check duplicates            │ caller reads
//!          ──► Gathered { families, error, guard } ──────┘ until drop/release
//! ```
//!
//! Raw collectors may hand out buffers they intend to reuse on their next call, so
//! no other gather may run its raw collectors until the current result is released.
//! A caller that never releases starves every later gather; keep `Gathered` scoped
//! or use [`TransactionalGatherer::with_gathered`].

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::config::{DuplicatePolicy, GatherConfig};
use crate::error::{CacheError, Result};
use crate::gather::{Gathered, Gatherer, RawCollector, SharedFamily, TransactionalGatherer};
use crate::metrics::GatherMetrics;

/// Combines a base [`Gatherer`] with raw collectors behind a single gather lock.
pub struct BlockingRegistry<G = prometheus::Registry> {
    base: G,
    raw_collectors: Vec<Arc<dyn RawCollector>>,
    lock: Mutex<()>,
    config: GatherConfig,
    metrics: GatherMetrics,
}

impl<G: Gatherer> BlockingRegistry<G> {
    /// Create a registry with default configuration.
    pub fn new(base: G) -> Self {
        Self::with_config(base, GatherConfig::default())
    }

    /// Create a registry with the given configuration.
    ///
    /// If the configuration carries a `prometheus_registry`, the registry's own
    /// [`GatherMetrics`] are registered on it.
    pub fn with_config(base: G, config: GatherConfig) -> Self {
        let metrics = GatherMetrics::new();
        if let Some(ref registry) = config.prometheus_registry {
            if let Err(e) = metrics.register(registry) {
                warn!(%e, "failed to register gather metrics");
            }
        }
        Self {
            base,
            raw_collectors: Vec::new(),
            lock: Mutex::new(()),
            config,
            metrics,
        }
    }

    /// Add a raw collector. Collectors run in registration order.
    ///
    /// Takes `&mut self`, so registration cannot race with a gather.
    pub fn register_raw(&mut self, collector: Arc<dyn RawCollector>) {
        debug!(collector = collector.name(), "registered raw collector");
        self.raw_collectors.push(collector);
        self.metrics.set_raw_collectors(self.raw_collectors.len());
    }

    /// Number of registered raw collectors.
    pub fn raw_collectors(&self) -> usize {
        self.raw_collectors.len()
    }

    pub fn base(&self) -> &G {
        &self.base
    }

    pub fn config(&self) -> &GatherConfig {
        &self.config
    }

    pub fn metrics(&self) -> &GatherMetrics {
        &self.metrics
    }

    fn acquire(&self) -> Result<MutexGuard<'_, ()>> {
        let Some(timeout) = self.config.gather_timeout() else {
            return Ok(self.lock.lock());
        };
        self.lock.try_lock_for(timeout).ok_or_else(|| {
            self.metrics.record_busy();
            warn!(?timeout, "gather lock busy, previous result not released");
            CacheError::Busy { waited: timeout }
        })
    }

    /// Report (and for [`DuplicatePolicy::Reject`], drop) repeated family names.
    ///
    /// `families` must be sorted by name. The first occurrence wins.
    fn check_duplicates(&self, families: &mut Vec<SharedFamily>) -> Option<CacheError> {
        let policy = self.config.duplicate_policy;
        if policy == DuplicatePolicy::Allow {
            return None;
        }

        let mut duplicates: Vec<String> = families
            .windows(2)
            .filter(|pair| pair[0].get_name() == pair[1].get_name())
            .map(|pair| pair[1].get_name().to_string())
            .collect();
        if duplicates.is_empty() {
            return None;
        }

        self.metrics.record_duplicates(duplicates.len());
        warn!(names = ?duplicates, ?policy, "duplicate metric families across sources");

        if policy != DuplicatePolicy::Reject {
            return None;
        }
        families.dedup_by(|later, earlier| later.get_name() == earlier.get_name());
        duplicates.dedup();
        Some(CacheError::DuplicateFamily(duplicates.join(", ")))
    }
}

impl<G: Gatherer> TransactionalGatherer for BlockingRegistry<G> {
    fn gather(&self) -> Result<Gathered<'_>> {
        let (managed, mut error) = match self.base.gather() {
            Ok(families) => (families, None),
            Err(e) => {
                warn!(%e, "base gatherer failed, continuing with raw collectors");
                (Vec::new(), Some(e))
            }
        };
        let base_failed = error.is_some();

        // Held until the caller releases the result.
        let guard = self.acquire()?;

        let mut families: Vec<SharedFamily> = Vec::with_capacity(managed.len());
        families.extend(managed.into_iter().map(Arc::new));
        for collector in &self.raw_collectors {
            collector.collect_into(&mut families);
        }

        // Stable and run-adaptive: each source's sorted output is merged, and managed
        // families stay ahead of raw ones with the same name.
        families.sort_by(|a, b| a.get_name().cmp(b.get_name()));

        let duplicate_error = self.check_duplicates(&mut families);
        if error.is_none() {
            error = duplicate_error;
        }

        self.metrics.record_gather(families.len(), base_failed);
        debug!(
            families = families.len(),
            raw_collectors = self.raw_collectors.len(),
            partial = error.is_some(),
            "gathered metric families"
        );
        Ok(Gathered::new(families, error, Some(guard)))
    }
}

impl<G> fmt::Debug for BlockingRegistry<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRegistry")
            .field(
                "raw_collectors",
                &self
                    .raw_collectors
                    .iter()
                    .map(|c| c.name())
                    .collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .field("locked", &self.lock.is_locked())
            .finish()
    }
}
