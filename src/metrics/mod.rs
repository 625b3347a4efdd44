//! Self-observability metrics for metric-cache.
//!
//! A [`BlockingRegistry`](crate::BlockingRegistry) always records into its
//! [`GatherMetrics`] (plain atomic operations). Exposition is optional: pass a
//! `prometheus::Registry` to the builder to have them registered for scraping.
//!
//! # Available Metrics
//!
//! ## Counters (cumulative)
//!
//! - `metric_cache_gathers_total` - Gathers completed, including partial ones
//! - `metric_cache_gather_errors_total` - Gathers whose base gatherer failed
//! - `metric_cache_duplicate_families_total` - Duplicate family names across sources
//! - `metric_cache_gather_busy_total` - Gathers that timed out waiting for the lock
//!
//! ## Gauges (current values)
//!
//! - `metric_cache_last_gather_families` - Families returned by the last gather
//! - `metric_cache_raw_collectors` - Registered raw collectors

mod prometheus;

pub use prometheus::GatherMetrics;
