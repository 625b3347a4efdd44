//! Descriptor cache and per-cycle collection sessions.
//!
//! A [`DescriptorCache`] lives as long as its owner and maps metric names to the
//! last [`Descriptor`] built for them. Each collection cycle opens a
//! [`CollectionSession`], which exclusively borrows the cache for the duration of
//! the cycle:
//!
//! ```text
//! DescriptorCache (name -> Arc<Descriptor>, survives cycles)
//!   └── CollectionSession<'_> (one cycle)
//!         ├── touched: names resolved this cycle
//!         └── staged:  snapshots recorded this cycle
//! ```
//!
//! Resolving a descriptor whose help text and label schema did not change returns
//! the cached `Arc` without allocating a new descriptor. A changed schema silently
//! replaces the cached entry.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use prometheus::proto::{MetricFamily, MetricType};
use tracing::{debug, warn};

use crate::desc::{Descriptor, Labels};
use crate::error::Result;
use crate::snapshot::CachedSnapshot;

/// Counters describing how the cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Resolves answered with the cached descriptor.
    pub hits: u64,
    /// Resolves for a name that was not cached.
    pub misses: u64,
    /// Resolves that replaced a cached descriptor with a different schema.
    pub replacements: u64,
    /// Entries removed through eviction.
    pub evictions: u64,
}

/// Process-local table of descriptors, keyed by metric name.
///
/// Holds at most one descriptor per name.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    by_name: HashMap<String, Arc<Descriptor>>,
    stats: CacheStats,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a collection cycle against this cache.
    pub fn new_session(&mut self) -> CollectionSession<'_> {
        let capacity = self.by_name.len();
        CollectionSession {
            cache: self,
            touched: Vec::with_capacity(capacity),
            staged: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Descriptor>> {
        self.by_name.get(name)
    }

    /// Names currently cached, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Remove the descriptor cached under `name`.
    pub fn evict(&mut self, name: &str) -> Option<Arc<Descriptor>> {
        let removed = self.by_name.remove(name);
        if removed.is_some() {
            self.stats.evictions += 1;
            debug!(name, "evicted cached descriptor");
        }
        removed
    }
}

/// A single collection cycle over a [`DescriptorCache`].
///
/// The session records every name it resolves, so names that were cached but not
/// touched this cycle can be identified as stale.
pub struct CollectionSession<'a> {
    cache: &'a mut DescriptorCache,
    touched: Vec<Arc<Descriptor>>,
    staged: Vec<CachedSnapshot>,
}

impl<'a> CollectionSession<'a> {
    /// Return the descriptor for `name`, reusing the cached one when its content matches.
    ///
    /// If the cached descriptor differs in help text or label schema, a new one is
    /// built and replaces it. Replacement is never an error.
    pub fn resolve<S: AsRef<str>>(
        &mut self,
        name: &str,
        help: &str,
        variable_labels: &[S],
        const_labels: &Labels,
    ) -> Arc<Descriptor> {
        let cached = self
            .cache
            .by_name
            .get(name)
            .filter(|d| d.is_content_equal(help, variable_labels, const_labels))
            .cloned();

        if let Some(desc) = cached {
            // Fast path: same schema as last cycle.
            self.cache.stats.hits += 1;
            self.touched.push(Arc::clone(&desc));
            return desc;
        }

        let desc = Arc::new(Descriptor::new(name, help, variable_labels, const_labels));
        match self
            .cache
            .by_name
            .insert(name.to_string(), Arc::clone(&desc))
        {
            Some(previous) => {
                self.cache.stats.replacements += 1;
                debug!(
                    name,
                    old_help = previous.help(),
                    new_help = desc.help(),
                    "descriptor schema changed, replacing cached entry"
                );
            }
            None => self.cache.stats.misses += 1,
        }
        self.touched.push(Arc::clone(&desc));
        desc
    }

    /// Names resolved so far, in resolve order. Repeated resolves appear repeatedly.
    pub fn touched(&self) -> impl Iterator<Item = &str> {
        self.touched.iter().map(|d| d.name())
    }

    pub fn touched_len(&self) -> usize {
        self.touched.len()
    }

    /// Cached names that have not been resolved in this session.
    pub fn stale_names(&self) -> Vec<String> {
        let touched: HashSet<&str> = self.touched().collect();
        let mut stale: Vec<String> = self
            .cache
            .names()
            .filter(|name| !touched.contains(name))
            .map(str::to_string)
            .collect();
        stale.sort();
        stale
    }

    /// Evict every stale name from the cache. Returns how many were evicted.
    pub fn evict_stale(&mut self) -> usize {
        let stale = self.stale_names();
        for name in &stale {
            self.cache.evict(name);
        }
        stale.len()
    }

    /// Stage a snapshot for the families built by [`CollectionSession::into_families`].
    pub fn record(&mut self, snapshot: &CachedSnapshot) {
        self.staged.push(snapshot.clone());
    }

    /// Build a snapshot from a freshly computed value and stage it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidMetric`](crate::CacheError::InvalidMetric) under the
    /// same conditions as [`CachedSnapshot::new`].
    pub fn record_value<S: AsRef<str>>(
        &mut self,
        desc: Arc<Descriptor>,
        kind: MetricType,
        value: f64,
        label_values: &[S],
    ) -> Result<()> {
        let snapshot = CachedSnapshot::new(desc, kind, value, label_values)?;
        self.staged.push(snapshot);
        Ok(())
    }

    /// Number of snapshots staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Group the staged snapshots into metric families sorted by name.
    ///
    /// Samples keep their record order within a family. Help text and schema come
    /// from the descriptor currently cached under each name, or from the first
    /// snapshot when the name is not cached. Samples built from a different
    /// descriptor, or with a different type, are dropped.
    pub fn into_families(self) -> Vec<MetricFamily> {
        let mut families: BTreeMap<&str, (&Arc<Descriptor>, MetricFamily)> = BTreeMap::new();
        for snapshot in &self.staged {
            let desc = snapshot.desc();
            let (current, family) = families.entry(desc.name()).or_insert_with(|| {
                let current = self.cache.by_name.get(desc.name()).unwrap_or(desc);
                let mut family = MetricFamily::default();
                family.set_name(current.name().to_string());
                family.set_help(current.help().to_string());
                family.set_field_type(snapshot.kind());
                (current, family)
            });
            let current: &Arc<Descriptor> = *current;
            if !Arc::ptr_eq(current, desc) && **current != **desc {
                warn!(
                    name = desc.name(),
                    help = desc.help(),
                    current_help = current.help(),
                    "dropping sample built from a replaced descriptor"
                );
                continue;
            }
            if family.get_field_type() != snapshot.kind() {
                warn!(
                    name = desc.name(),
                    expected = ?family.get_field_type(),
                    got = ?snapshot.kind(),
                    "dropping sample with inconsistent metric type"
                );
                continue;
            }
            family.mut_metric().push(snapshot.sample().clone());
        }
        families.into_values().map(|(_, family)| family).collect()
    }
}
