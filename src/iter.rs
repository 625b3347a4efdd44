//! Pull-based iteration over gathered metric families.

use std::iter::FusedIterator;

use prometheus::proto::MetricFamily;

use crate::gather::SharedFamily;

/// Streams gathered families one at a time, in gather order (sorted by name).
///
/// The cursor starts before the first family. Once exhausted the iterator keeps
/// returning `None`; iterating again needs a fresh gather.
#[derive(Debug, Clone)]
pub struct FamilyIter<'a> {
    families: &'a [SharedFamily],
    next: usize,
}

impl<'a> FamilyIter<'a> {
    pub fn new(families: &'a [SharedFamily]) -> Self {
        Self { families, next: 0 }
    }

    /// Families not yet returned.
    pub fn remaining(&self) -> usize {
        self.families.len() - self.next
    }
}

impl<'a> Iterator for FamilyIter<'a> {
    type Item = &'a MetricFamily;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let family = self.families.get(self.next)?;
        self.next += 1;
        Some(family.as_ref())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FamilyIter<'_> {}

impl FusedIterator for FamilyIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn family(name: &str) -> SharedFamily {
        let mut family = MetricFamily::default();
        family.set_name(name.to_string());
        Arc::new(family)
    }

    #[test]
    fn test_iterates_in_order() {
        let families = vec![family("a"), family("b"), family("c")];
        let names: Vec<&str> = FamilyIter::new(&families).map(|f| f.get_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_exhausted_stays_exhausted() {
        let families = vec![family("a")];
        let mut iter = FamilyIter::new(&families);

        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next().map(|f| f.get_name()), Some("a"));
        assert_eq!(iter.remaining(), 0);
        for _ in 0..3 {
            assert!(iter.next().is_none());
        }
    }

    #[test]
    fn test_empty() {
        let mut iter = FamilyIter::new(&[]);
        assert_eq!(iter.size_hint(), (0, Some(0)));
        assert!(iter.next().is_none());
    }
}
