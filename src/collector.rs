//! A raw collector backed by a descriptor cache.
//!
//! [`CachedCollector`] is meant for metrics whose identity changes less often than
//! they are scraped, while their label values and samples keep moving. Each update
//! runs one [`CollectionSession`] against the collector's own [`DescriptorCache`],
//! then publishes the families built in that session. Collecting hands out the
//! published families without copying them.
//!
//! If you construct descriptors and const metrics inside a collect routine on every
//! scrape, a `CachedCollector` saves those allocations.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metric_cache::{BlockingRegistry, CachedCollector, Labels};
//! use prometheus::proto::MetricType;
//!
//! let collector = Arc::new(CachedCollector::new("queues"));
//! let mut registry = BlockingRegistry::new(prometheus::Registry::new());
//! registry.register_raw(collector.clone());
//!
//! // On every refresh:
//! collector.update(|session| {
//!     let desc = session.resolve("queue_depth", "Queue depth", &["queue"], &Labels::new());
//!     for (queue, depth) in queues() {
//!         session.record_value(desc.clone(), MetricType::GAUGE, depth, &[queue])?;
//!     }
//!     Ok(())
//! })?;
//! ```

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::cache::{CacheStats, CollectionSession, DescriptorCache};
use crate::config::GatherConfig;
use crate::error::Result;
use crate::gather::{RawCollector, SharedFamily};

/// Raw collector publishing the families built by its last successful session.
pub struct CachedCollector {
    name: String,
    descriptors: Mutex<DescriptorCache>,
    published: RwLock<Vec<SharedFamily>>,
    evict_stale: bool,
}

impl CachedCollector {
    /// Create an empty collector. `name` is used in logs.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: Mutex::new(DescriptorCache::new()),
            published: RwLock::new(Vec::new()),
            evict_stale: false,
        }
    }

    /// Create a collector that follows `config.evict_stale`.
    pub fn from_config(name: impl Into<String>, config: &GatherConfig) -> Self {
        Self::new(name).with_evict_stale(config.evict_stale)
    }

    /// Evict descriptors that were not resolved during an update.
    pub fn with_evict_stale(mut self, enabled: bool) -> Self {
        self.evict_stale = enabled;
        self
    }

    /// Run one collection session and publish its families.
    ///
    /// Sessions on the same collector run one at a time. If `f` fails, the previously
    /// published families stay in place; descriptors resolved before the failure stay
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut CollectionSession<'_>) -> Result<()>,
    {
        let mut cache = self.descriptors.lock();
        let mut session = cache.new_session();
        f(&mut session)?;

        if self.evict_stale {
            let evicted = session.evict_stale();
            if evicted > 0 {
                debug!(collector = %self.name, evicted, "evicted stale descriptors");
            }
        }

        let families: Vec<SharedFamily> = session
            .into_families()
            .into_iter()
            .map(Arc::new)
            .collect();
        debug!(collector = %self.name, families = families.len(), "published cached families");
        *self.published.write() = families;
        Ok(())
    }

    /// Descriptor cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.descriptors.lock().stats()
    }

    /// Number of cached descriptors.
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.lock().len()
    }
}

impl RawCollector for CachedCollector {
    fn collect_into(&self, out: &mut Vec<SharedFamily>) {
        out.extend(self.published.read().iter().cloned());
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CachedCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCollector")
            .field("name", &self.name)
            .field("published", &self.published.read().len())
            .field("evict_stale", &self.evict_stale)
            .finish()
    }
}
