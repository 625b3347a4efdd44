//! Immutable, pre-materialized metric samples.
//!
//! A [`CachedSnapshot`] validates its inputs and builds the exported
//! `prometheus::proto::Metric` exactly once. Collecting it afterwards hands out the
//! same sample without recomputation, so values that are computed once can be
//! reused verbatim across harvest cycles.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metric_cache::{CachedSnapshot, Descriptor, Labels};
//! use prometheus::proto::MetricType;
//!
//! let desc = Arc::new(Descriptor::new("build_info", "Build metadata", &["version"], &Labels::new()));
//! let snapshot = CachedSnapshot::new(desc, MetricType::GAUGE, 1.0, &["1.4.2"])?;
//! assert_eq!(snapshot.value(), 1.0);
//! ```

use std::sync::Arc;

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType, Untyped};

use crate::desc::Descriptor;
use crate::error::{CacheError, Result};

/// A metric value computed once and shared read-only afterwards.
///
/// Cloning is cheap: clones share the materialized sample.
#[derive(Clone)]
pub struct CachedSnapshot {
    inner: Arc<SnapshotInner>,
}

#[derive(Clone)]
struct SnapshotInner {
    desc: Arc<Descriptor>,
    kind: MetricType,
    value: f64,
    sample: Metric,
}

impl CachedSnapshot {
    /// Validate and materialize a single-value sample.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidMetric`] if the descriptor recorded a validation
    /// error, if the number of label values does not match the descriptor's variable
    /// labels, or if `kind` is not one of `COUNTER`, `GAUGE` or `UNTYPED`.
    pub fn new<S: AsRef<str>>(
        desc: Arc<Descriptor>,
        kind: MetricType,
        value: f64,
        label_values: &[S],
    ) -> Result<Self> {
        if let Some(err) = desc.validation_error() {
            return Err(CacheError::invalid(err));
        }
        if label_values.len() != desc.variable_labels().len() {
            return Err(CacheError::invalid(format!(
                "{}: expected {} label values but got {}",
                desc.name(),
                desc.variable_labels().len(),
                label_values.len()
            )));
        }

        let mut sample = Metric::default();
        match kind {
            MetricType::COUNTER => {
                let mut counter = Counter::default();
                counter.set_value(value);
                sample.set_counter(counter);
            }
            MetricType::GAUGE => {
                let mut gauge = Gauge::default();
                gauge.set_value(value);
                sample.set_gauge(gauge);
            }
            MetricType::UNTYPED => {
                let mut untyped = Untyped::default();
                untyped.set_value(value);
                sample.set_untyped(untyped);
            }
            other => {
                return Err(CacheError::invalid(format!(
                    "{}: unsupported value kind {:?} for a single-value snapshot",
                    desc.name(),
                    other
                )));
            }
        }
        sample.set_label(label_pairs(&desc, label_values).into());

        Ok(Self {
            inner: Arc::new(SnapshotInner {
                desc,
                kind,
                value,
                sample,
            }),
        })
    }

    /// Like [`CachedSnapshot::new`], but panics on invalid input.
    ///
    /// Meant for call sites where a malformed metric is a programming error.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions that make `new` return an error.
    pub fn must_new<S: AsRef<str>>(
        desc: Arc<Descriptor>,
        kind: MetricType,
        value: f64,
        label_values: &[S],
    ) -> Self {
        match Self::new(desc, kind, value, label_values) {
            Ok(snapshot) => snapshot,
            Err(e) => panic!("{}", e),
        }
    }

    /// Attach an explicit timestamp (milliseconds since the epoch) to the sample.
    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        Arc::make_mut(&mut self.inner)
            .sample
            .set_timestamp_ms(timestamp_ms);
        self
    }

    pub fn desc(&self) -> &Arc<Descriptor> {
        &self.inner.desc
    }

    pub fn kind(&self) -> MetricType {
        self.inner.kind
    }

    pub fn value(&self) -> f64 {
        self.inner.value
    }

    /// The materialized sample. Always the same value for a given snapshot.
    #[inline]
    pub fn sample(&self) -> &Metric {
        &self.inner.sample
    }

    /// Wrap the sample in a single-sample metric family.
    pub fn to_family(&self) -> MetricFamily {
        let mut family = MetricFamily::default();
        family.set_name(self.inner.desc.name().to_string());
        family.set_help(self.inner.desc.help().to_string());
        family.set_field_type(self.inner.kind);
        family.mut_metric().push(self.inner.sample.clone());
        family
    }
}

impl std::fmt::Debug for CachedSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSnapshot")
            .field("name", &self.inner.desc.name())
            .field("kind", &self.inner.kind)
            .field("value", &self.inner.value)
            .finish()
    }
}

/// Constant and variable labels merged and sorted by label name.
fn label_pairs<S: AsRef<str>>(desc: &Descriptor, label_values: &[S]) -> Vec<LabelPair> {
    let mut pairs: Vec<LabelPair> =
        Vec::with_capacity(desc.const_labels().len() + label_values.len());
    for (name, value) in desc.const_labels() {
        pairs.push(label_pair(name, value));
    }
    for (name, value) in desc.variable_labels().iter().zip(label_values) {
        let value: &str = value.as_ref();
        pairs.push(label_pair(name, value));
    }
    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    pairs
}

fn label_pair(name: &str, value: &str) -> LabelPair {
    let mut pair = LabelPair::default();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}
