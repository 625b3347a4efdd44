//! Gathering contracts.
//!
//! - [`Gatherer`]: a managed source that returns freshly allocated, sorted,
//!   caller-owned families on every call (e.g. `prometheus::Registry`).
//! - [`RawCollector`]: a source invoked directly at gather time that may hand out
//!   internally owned buffers it reuses on its next call.
//! - [`TransactionalGatherer`]: returns families inside a [`Gathered`] guard. The
//!   families stay valid until the guard is released (dropped), after which the
//!   producers are free to reuse their buffers.
//!
//! # Example
//!
//! ```ignore
//! use metric_cache::{BlockingRegistry, TransactionalGatherer};
//! use prometheus::TextEncoder;
//!
//! let registry = BlockingRegistry::new(prometheus::Registry::new());
//!
//! let gathered = registry.gather()?;
//! if let Some(err) = gathered.error() {
//!     tracing::warn!(%err, "partial gather");
//! }
//! let mut buffer = Vec::new();
//! gathered.encode(&TextEncoder::new(), &mut buffer)?;
//! gathered.release();
//! ```

use std::fmt;
use std::io::Write;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::MutexGuard;
use prometheus::proto::MetricFamily;
use prometheus::Encoder;

use crate::error::{CacheError, Result};
use crate::iter::FamilyIter;

/// A gathered metric family. Shared so raw collectors can hand out cached
/// families without copying them.
pub type SharedFamily = Arc<MetricFamily>;

/// A managed source of metric families.
///
/// Implementations return families sorted by name that the caller owns.
pub trait Gatherer: Send + Sync {
    fn gather(&self) -> Result<Vec<MetricFamily>>;
}

impl Gatherer for prometheus::Registry {
    fn gather(&self) -> Result<Vec<MetricFamily>> {
        Ok(prometheus::Registry::gather(self))
    }
}

impl<G: Gatherer + ?Sized> Gatherer for Arc<G> {
    fn gather(&self) -> Result<Vec<MetricFamily>> {
        (**self).gather()
    }
}

impl<G: Gatherer + ?Sized> Gatherer for Box<G> {
    fn gather(&self) -> Result<Vec<MetricFamily>> {
        (**self).gather()
    }
}

/// A source invoked directly at gather time, outside the managed registry.
///
/// Output must be sorted by name within one call. There is no error channel: a
/// collector that cannot produce data appends nothing.
pub trait RawCollector: Send + Sync {
    /// Append this collector's families to `out`.
    fn collect_into(&self, out: &mut Vec<SharedFamily>);

    /// Collect into a new vector.
    fn collect(&self) -> Vec<SharedFamily> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    /// Name of this collector for logging.
    fn name(&self) -> &str {
        "raw"
    }
}

impl<C: RawCollector + ?Sized> RawCollector for Arc<C> {
    fn collect_into(&self, out: &mut Vec<SharedFamily>) {
        (**self).collect_into(out)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Families returned by a [`TransactionalGatherer`], valid until released.
///
/// Holding a `Gathered` from a [`BlockingRegistry`](crate::BlockingRegistry) blocks
/// every other gather on that registry. Dropping it, or calling
/// [`Gathered::release`], ends the read window on every exit path.
///
/// `Gathered` is `Send`: it can be handed to an encoder thread or held across an
/// `.await`, and released from wherever it ends up.
#[must_use = "dropping `Gathered` immediately releases the gathered families"]
pub struct Gathered<'a> {
    families: Vec<SharedFamily>,
    error: Option<CacheError>,
    _guard: Option<MutexGuard<'a, ()>>,
}

impl<'a> Gathered<'a> {
    pub(crate) fn new(
        families: Vec<SharedFamily>,
        error: Option<CacheError>,
        guard: Option<MutexGuard<'a, ()>>,
    ) -> Self {
        Self {
            families,
            error,
            _guard: guard,
        }
    }

    /// Families sorted by name.
    pub fn families(&self) -> &[SharedFamily] {
        &self.families
    }

    /// Partial failure that occurred while gathering.
    ///
    /// The families are still best-effort data and should be exported.
    pub fn error(&self) -> Option<&CacheError> {
        self.error.as_ref()
    }

    /// Take the partial failure out, leaving `None`.
    pub fn take_error(&mut self) -> Option<CacheError> {
        self.error.take()
    }

    /// Whether this result holds its source's gather lock.
    pub fn holds_lock(&self) -> bool {
        self._guard.is_some()
    }

    /// Iterate the families one at a time.
    pub fn iter(&self) -> FamilyIter<'_> {
        FamilyIter::new(&self.families)
    }

    /// Stream the families through `encoder`, one family per call.
    ///
    /// Families without samples are skipped.
    pub fn encode<E: Encoder, W: Write>(&self, encoder: &E, writer: &mut W) -> Result<()> {
        for family in self.iter().filter(|f| !f.get_metric().is_empty()) {
            encoder.encode(std::slice::from_ref(family), writer)?;
        }
        Ok(())
    }

    /// End the read window. Equivalent to dropping the value.
    pub fn release(self) {
        drop(self)
    }
}

impl Deref for Gathered<'_> {
    type Target = [SharedFamily];

    fn deref(&self) -> &Self::Target {
        &self.families
    }
}

impl<'g> IntoIterator for &'g Gathered<'_> {
    type Item = &'g MetricFamily;
    type IntoIter = FamilyIter<'g>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Gathered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gathered")
            .field(
                "families",
                &self.families.iter().map(|f| f.get_name()).collect::<Vec<_>>(),
            )
            .field("error", &self.error)
            .field("holds_lock", &self.holds_lock())
            .finish()
    }
}

/// A source whose gathered families must be released explicitly.
pub trait TransactionalGatherer {
    /// Gather families.
    ///
    /// `Err` means nothing was gathered and no lock is held. `Ok` may still carry a
    /// partial failure in [`Gathered::error`].
    fn gather(&self) -> Result<Gathered<'_>>;

    /// Gather, run `f` over the result, and release before returning.
    ///
    /// Trait objects use the free function [`with_gathered`].
    fn with_gathered<F, R>(&self, f: F) -> Result<R>
    where
        Self: Sized,
        F: FnOnce(&Gathered<'_>) -> R,
    {
        with_gathered(self, f)
    }
}

/// Gather from `gatherer`, run `f` over the result, and release before returning.
///
/// Works with `&dyn TransactionalGatherer`.
pub fn with_gathered<T, F, R>(gatherer: &T, f: F) -> Result<R>
where
    T: TransactionalGatherer + ?Sized,
    F: FnOnce(&Gathered<'_>) -> R,
{
    let gathered = gatherer.gather()?;
    Ok(f(&gathered))
}

/// Adapts a plain [`Gatherer`] to the transactional contract. Release is a no-op.
#[derive(Debug, Clone)]
pub struct ToTransactional<G>(pub G);

impl<G: Gatherer> TransactionalGatherer for ToTransactional<G> {
    fn gather(&self) -> Result<Gathered<'_>> {
        let families = Gatherer::gather(&self.0)?
            .into_iter()
            .map(Arc::new)
            .collect();
        Ok(Gathered::new(families, None, None))
    }
}
