#![forbid(unsafe_code)]

//! Row-membership sets: which physical row indices of a table are logically present.

use crate::bitmap::{BitVec, IterOnes};
use crate::error::{Result, TableError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Below this density a filtered set is stored as a sorted index list instead of a bitmap.
///
/// A bitmap costs one bit per physical row while an index list costs a word per member, so the
/// list wins once fewer than roughly 1 in 64 rows survive.
const SPARSE_DENSITY_DIVISOR: usize = 64;

/// An ordered enumeration of row indices used to drive compaction.
///
/// Unlike a [`MembershipSet`], a row order may list rows in any order, e.g. `[2, 0]`.
pub trait RowOrder {
    fn size(&self) -> usize;
    fn row_iter(&self) -> Box<dyn Iterator<Item = usize> + '_>;
}

impl RowOrder for [usize] {
    fn size(&self) -> usize {
        self.len()
    }

    fn row_iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.iter().copied())
    }
}

impl RowOrder for Vec<usize> {
    fn size(&self) -> usize {
        self.len()
    }

    fn row_iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.iter().copied())
    }
}

impl RowOrder for MembershipSet {
    fn size(&self) -> usize {
        MembershipSet::size(self)
    }

    fn row_iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new(self.iter())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipKind {
    Full,
    Sparse,
    Dense,
}

#[derive(Clone, Debug)]
enum Repr {
    Full,
    /// Sorted, deduplicated row indices.
    Sparse(Arc<[usize]>),
    Dense(Arc<BitVec>),
}

/// Immutable set of valid row indices within `0..max`.
///
/// Every variant answers [`MembershipSet::size`] in O(1); `Full` also answers `contains` in O(1).
#[derive(Clone, Debug)]
pub struct MembershipSet {
    repr: Repr,
    max: usize,
}

impl MembershipSet {
    /// All rows `0..size`.
    pub fn full(size: usize) -> Self {
        Self {
            repr: Repr::Full,
            max: size,
        }
    }

    /// An arbitrary subset of `0..max`. Input order and duplicates do not matter.
    pub fn from_rows(mut rows: Vec<usize>, max: usize) -> Result<Self> {
        rows.sort_unstable();
        rows.dedup();
        if let Some(&last) = rows.last() {
            if last >= max {
                return Err(TableError::RowOutOfBounds {
                    row: last,
                    size: max,
                });
            }
        }
        if rows.len() == max {
            return Ok(Self::full(max));
        }
        Ok(Self {
            repr: Repr::Sparse(rows.into()),
            max,
        })
    }

    /// A set backed by a bitmap over `0..bits.len()`.
    pub fn from_bitmap(bits: BitVec) -> Self {
        let max = bits.len();
        if bits.all_true() {
            return Self::full(max);
        }
        Self {
            repr: Repr::Dense(Arc::new(bits)),
            max,
        }
    }

    pub fn kind(&self) -> MembershipKind {
        match self.repr {
            Repr::Full => MembershipKind::Full,
            Repr::Sparse(_) => MembershipKind::Sparse,
            Repr::Dense(_) => MembershipKind::Dense,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self.repr, Repr::Full)
    }

    /// Number of member rows.
    pub fn size(&self) -> usize {
        match &self.repr {
            Repr::Full => self.max,
            Repr::Sparse(rows) => rows.len(),
            Repr::Dense(bits) => bits.count_ones(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Exclusive upper bound on member indices (the physical row count they refer to).
    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, row: usize) -> bool {
        if row >= self.max {
            return false;
        }
        match &self.repr {
            Repr::Full => true,
            Repr::Sparse(rows) => rows.binary_search(&row).is_ok(),
            Repr::Dense(bits) => bits.get(row),
        }
    }

    /// Member rows in increasing order.
    pub fn iter(&self) -> MembershipIter<'_> {
        match &self.repr {
            Repr::Full => MembershipIter::Range(0..self.max),
            Repr::Sparse(rows) => MembershipIter::Sparse(rows.iter()),
            Repr::Dense(bits) => MembershipIter::Dense(bits.iter_ones()),
        }
    }

    /// Members satisfying `predicate`, over the same physical index space.
    pub fn filter(&self, predicate: impl Fn(usize) -> bool) -> MembershipSet {
        let selected: Vec<usize> = self.iter().filter(|&row| predicate(row)).collect();
        if selected.len() == self.max {
            return Self::full(self.max);
        }
        if selected.len() * SPARSE_DENSITY_DIVISOR < self.max {
            return Self {
                repr: Repr::Sparse(selected.into()),
                max: self.max,
            };
        }
        Self::from_bitmap(BitVec::from_indices(self.max, selected))
    }

    /// A uniform sample of `min(k, size)` members drawn without replacement.
    ///
    /// The same seed always yields the same sample for the same set.
    pub fn sample(&self, k: usize, seed: u64) -> MembershipSet {
        let size = self.size();
        if k >= size {
            return self.clone();
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = rand::seq::index::sample(&mut rng, size, k).into_vec();
        positions.sort_unstable();

        let rows: Vec<usize> = match &self.repr {
            Repr::Full => positions,
            Repr::Sparse(rows) => positions.into_iter().map(|p| rows[p]).collect(),
            Repr::Dense(_) => {
                // Positions are sorted, so one forward pass over the members is enough.
                let mut wanted = positions.into_iter().peekable();
                let mut out = Vec::with_capacity(k);
                for (pos, row) in self.iter().enumerate() {
                    match wanted.peek() {
                        Some(&next) if next == pos => {
                            out.push(row);
                            wanted.next();
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                out
            }
        };

        log::debug!("sampled {} of {} rows", rows.len(), size);
        Self {
            repr: Repr::Sparse(rows.into()),
            max: self.max,
        }
    }
}

pub enum MembershipIter<'a> {
    Range(std::ops::Range<usize>),
    Sparse(std::slice::Iter<'a, usize>),
    Dense(IterOnes<'a>),
}

impl Iterator for MembershipIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            Self::Range(range) => range.next(),
            Self::Sparse(iter) => iter.next().copied(),
            Self::Dense(iter) => iter.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_rows_sorts_and_checks_bounds() {
        let set = MembershipSet::from_rows(vec![5, 1, 3, 1], 6).unwrap();
        assert_eq!(set.kind(), MembershipKind::Sparse);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(set.contains(3));
        assert!(!set.contains(2));

        let err = MembershipSet::from_rows(vec![0, 6], 6).unwrap_err();
        assert_eq!(err, TableError::RowOutOfBounds { row: 6, size: 6 });
    }

    #[test]
    fn from_rows_covering_everything_is_full() {
        let set = MembershipSet::from_rows(vec![2, 1, 0], 3).unwrap();
        assert!(set.is_full());
    }

    #[test]
    fn filter_picks_representation_by_density() {
        let full = MembershipSet::full(1000);

        let dense = full.filter(|row| row % 2 == 0);
        assert_eq!(dense.kind(), MembershipKind::Dense);
        assert_eq!(dense.size(), 500);

        let sparse = full.filter(|row| row % 100 == 0);
        assert_eq!(sparse.kind(), MembershipKind::Sparse);
        assert_eq!(sparse.iter().collect::<Vec<_>>(), (0..10).map(|i| i * 100).collect::<Vec<_>>());

        let all = full.filter(|_| true);
        assert!(all.is_full());
    }

    #[test]
    fn sample_is_a_deterministic_subset() {
        let set = MembershipSet::full(200).filter(|row| row % 3 != 0);
        let a = set.sample(25, 7);
        let b = set.sample(25, 7);
        assert_eq!(a.size(), 25);
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
        assert!(a.iter().all(|row| set.contains(row)));
    }

    #[test]
    fn oversized_sample_returns_everything() {
        let set = MembershipSet::from_rows(vec![1, 4, 9], 10).unwrap();
        let sample = set.sample(10, 0);
        assert_eq!(sample.iter().collect::<Vec<_>>(), vec![1, 4, 9]);
    }
}
