//! # metric-cache
//!
//! **Descriptor caching and transactional gathering for Prometheus instrumentation**
//!
//! Metric identity (name, help text, label schema) rarely changes, while values
//! change on every scrape. This crate keeps identities cached across collection
//! cycles and makes harvesting race-free when some producers hand out buffers they
//! reuse on their next call.
//!
//! ## Features
//!
//! - **Descriptor Cache**: `CollectionSession::resolve()` returns the cached
//!   `Arc<Descriptor>` when nothing changed, and replaces it transparently when it did
//! - **Cached Snapshots**: validate and materialize a sample once, collect it forever
//! - **Transactional Gather**: families come back inside a guard; the producers'
//!   buffers stay untouched until the guard is released
//! - **Blocking Registry**: merges a `prometheus::Registry` with raw collectors,
//!   sorted by name, behind one lock held for the caller's whole read window
//! - **Lazy Iteration**: stream gathered families to an encoder one at a time
//! - **Flexible Configuration**: files (TOML/YAML/JSON), environment variables, code
//!   or CLI arguments
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use metric_cache::{CachedCollector, Labels, RegistryBuilder, TransactionalGatherer};
//! use prometheus::{proto::MetricType, TextEncoder};
//!
//! let prom = prometheus::Registry::new();
//! let queues = Arc::new(CachedCollector::new("queues"));
//!
//! let mut registry = RegistryBuilder::new()
//!     .env_prefix("METRIC_CACHE")
//!     .prometheus_registry(prom.clone())
//!     .build(prom)?;
//! registry.register_raw(queues.clone());
//!
//! // Refresh cycle
//! queues.update(|session| {
//!     let desc = session.resolve("queue_depth", "Queue depth", &["queue"], &Labels::new());
//!     session.record_value(desc, MetricType::GAUGE, 12.0, &["ingest"])
//! })?;
//!
//! // Scrape
//! let gathered = registry.gather()?;
//! if let Some(err) = gathered.error() {
//!     tracing::warn!(%err, "partial gather");
//! }
//! let mut body = Vec::new();
//! gathered.encode(&TextEncoder::new(), &mut body)?;
//! gathered.release();
//! ```
//!
//! ## Configuration
//!
//! Configuration sources are merged in order (later sources override earlier):
//!
//! 1. Default values
//! 2. Config files (via `.file()`)
//! 3. Environment variables (via `.env_prefix()`)
//! 4. Programmatic overrides
//! 5. CLI arguments (via `.with_cli_args()`)
//!
//! ### Config File Example (TOML)
//!
//! ```toml
//! gather_timeout_ms = 5000
//! duplicate_policy = "reject"
//! evict_stale = true
//! ```
//!
//! ### Environment Variables
//!
//! With `.env_prefix("METRIC_CACHE")`:
//! - `METRIC_CACHE_GATHER_TIMEOUT_MS=5000`
//! - `METRIC_CACHE_DUPLICATE_POLICY=warn`
//! - `METRIC_CACHE_EVICT_STALE=true`
//!
//! ## Releasing Gathered Families
//!
//! A [`BlockingRegistry`] admits one unreleased result at a time. Holding a
//! [`Gathered`] forever starves every later gather; keep it scoped, call
//! [`Gathered::release`], or use [`TransactionalGatherer::with_gathered`]. Set a
//! `gather_timeout_ms` to fail with [`CacheError::Busy`] instead of waiting
//! indefinitely.

pub mod builder;
pub mod cache;
pub mod collector;
pub mod config;
pub mod desc;
pub mod error;
pub mod gather;
pub mod iter;
pub mod metrics;
pub mod registry;
pub mod snapshot;

pub use builder::{GatherArgs, RegistryBuilder};
pub use cache::{CacheStats, CollectionSession, DescriptorCache};
pub use collector::CachedCollector;
pub use config::{DuplicatePolicy, GatherConfig};
pub use desc::{Descriptor, Labels};
pub use error::{CacheError, Result};
pub use gather::{
    with_gathered, Gathered, Gatherer, RawCollector, SharedFamily, ToTransactional,
    TransactionalGatherer,
};
pub use iter::FamilyIter;
pub use metrics::GatherMetrics;
pub use registry::BlockingRegistry;
pub use snapshot::CachedSnapshot;
