//! Dyadic interval trees over quantized numeric domains.
//!
//! The leaves of a decomposition are the quantization intervals of a column, in order. Any
//! contiguous run of leaves is the disjoint union of O(log n) aligned power-of-two blocks
//! ([`DyadicInterval`]s), so a count over any public bucket is the sum of a handful of tree
//! node counts. Noise is attached to the nodes, not the buckets, so every bucket and every
//! prefix that shares a node also shares its noise. Only the noise needs node indexing: the
//! exact part of a bucket is its plain count.

use crate::error::Result;
use prism_dataset::{BucketsDescription, ColumnQuantization, HeatmapSketch, HistogramSketch};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The aligned block of leaves `[index * 2^level, (index + 1) * 2^level)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DyadicInterval {
    pub level: u32,
    pub index: u64,
}

impl DyadicInterval {
    pub fn new(level: u32, index: u64) -> Self {
        Self { level, index }
    }

    pub fn leaf(index: u64) -> Self {
        Self::new(0, index)
    }

    pub fn len(&self) -> u64 {
        1u64 << self.level
    }

    pub fn start(&self) -> u64 {
        self.index << self.level
    }

    pub fn end(&self) -> u64 {
        self.start() + self.len()
    }

    pub fn range(&self) -> Range<u64> {
        self.start()..self.end()
    }

    pub fn parent(&self) -> Self {
        Self::new(self.level + 1, self.index / 2)
    }

    pub fn children(&self) -> Option<[Self; 2]> {
        if self.level == 0 {
            return None;
        }
        let level = self.level - 1;
        Some([
            Self::new(level, self.index * 2),
            Self::new(level, self.index * 2 + 1),
        ])
    }
}

/// The maximal aligned intervals whose disjoint union is `range`, ascending.
///
/// At most two intervals per level are produced.
pub fn decompose(range: Range<u64>) -> Vec<DyadicInterval> {
    let mut intervals = Vec::new();
    let mut start = range.start;
    while start < range.end {
        let remaining = range.end - start;
        let alignment = if start == 0 {
            u64::BITS - 1
        } else {
            start.trailing_zeros()
        };
        let fits = u64::BITS - 1 - remaining.leading_zeros();
        let level = alignment.min(fits);
        intervals.push(DyadicInterval::new(level, start >> level));
        start += 1u64 << level;
    }
    intervals
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

/// Maps the public buckets of one column onto the leaves of its quantization.
///
/// Built once per (quantization, buckets) pair and shared read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericDyadicDecomposition {
    quantization: ColumnQuantization,
    buckets: BucketsDescription,
    leaf_count: usize,
    height: u32,
    bucket_leaves: Vec<Range<usize>>,
}

impl NumericDyadicDecomposition {
    pub fn new(quantization: ColumnQuantization, buckets: BucketsDescription) -> Result<Self> {
        quantization.validate()?;
        buckets.validate()?;

        let leaf_count = quantization.interval_count();
        // Rank of a leaf along the bucket axis: 0 below `min`, b + 1 in bucket b, count + 1
        // above `max`. Non-decreasing in the leaf index, so bucket boundaries can be bisected.
        let rank = |leaf: usize| {
            let value = quantization.interval_start(leaf);
            if value < buckets.min {
                0
            } else {
                buckets.index_of(value).map_or(buckets.count + 1, |b| b + 1)
            }
        };
        let first_with_rank = |target: usize| {
            let (mut lo, mut hi) = (0, leaf_count);
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if rank(mid) < target {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            lo
        };
        let bucket_leaves = (0..buckets.count)
            .map(|b| first_with_rank(b + 1)..first_with_rank(b + 2))
            .collect();

        log::debug!(
            "dyadic decomposition: {leaf_count} leaves, {} buckets",
            buckets.count
        );
        Ok(Self {
            quantization,
            buckets,
            leaf_count,
            height: ceil_log2(leaf_count),
            bucket_leaves,
        })
    }

    pub fn quantization(&self) -> &ColumnQuantization {
        &self.quantization
    }

    pub fn buckets(&self) -> &BucketsDescription {
        &self.buckets
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Height of the tree: the root sits at this level.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of tree levels; every leaf lies under one node per level.
    pub fn levels(&self) -> u32 {
        self.height + 1
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_leaves.len()
    }

    /// Leaves whose quantized value falls into public bucket `bucket`.
    pub fn bucket_leaves(&self, bucket: usize) -> Range<usize> {
        self.bucket_leaves.get(bucket).cloned().unwrap_or(0..0)
    }

    pub fn bucket_nodes(&self, bucket: usize) -> Vec<DyadicInterval> {
        let leaves = self.bucket_leaves(bucket);
        decompose(leaves.start as u64..leaves.end as u64)
    }

    /// Nodes covering the leaves of buckets `0..=bucket`.
    pub fn prefix_nodes(&self, bucket: usize) -> Vec<DyadicInterval> {
        let last = bucket.min(self.bucket_count().saturating_sub(1));
        let occupied = |b: &usize| {
            let leaves = self.bucket_leaves(*b);
            leaves.start < leaves.end
        };
        let (Some(first), Some(last)) = ((0..=last).find(occupied), (0..=last).rfind(occupied))
        else {
            return Vec::new();
        };
        let start = self.bucket_leaves(first).start;
        let end = self.bucket_leaves(last).end;
        decompose(start as u64..end as u64)
    }

    /// Histogram sketch over the public buckets with this quantization applied.
    ///
    /// Its bucket counts are exactly the leaf sums of [`NumericDyadicDecomposition::bucket_leaves`].
    pub fn histogram_sketch(&self, column: impl Into<String>) -> HistogramSketch {
        HistogramSketch::new(column, self.buckets).with_quantization(self.quantization)
    }
}

/// Heatmap sketch over the public buckets of two decompositions, each axis quantized.
pub fn heatmap_sketch(
    x_column: impl Into<String>,
    x: &NumericDyadicDecomposition,
    y_column: impl Into<String>,
    y: &NumericDyadicDecomposition,
) -> HeatmapSketch {
    HeatmapSketch::new(x_column, x.buckets, y_column, y.buckets)
        .with_quantization(x.quantization, y.quantization)
}

/// Node weights of a complete binary tree over per-leaf counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DyadicTree {
    /// `levels[l][i]` is the weight of `DyadicInterval { level: l, index: i }`.
    levels: Vec<Vec<u64>>,
}

impl DyadicTree {
    pub fn from_leaves(counts: &[u64]) -> Self {
        let mut levels = Vec::new();
        let mut current = counts.to_vec();
        while current.len() > 1 {
            let parents = current.chunks(2).map(|pair| pair.iter().sum()).collect();
            levels.push(std::mem::replace(&mut current, parents));
        }
        levels.push(current);
        Self { levels }
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> u32 {
        self.levels.len().saturating_sub(1) as u32
    }

    pub fn total(&self) -> u64 {
        self.levels
            .last()
            .and_then(|root| root.first())
            .copied()
            .unwrap_or(0)
    }

    /// Count of leaves under `node`; nodes past the last leaf weigh nothing.
    pub fn weight(&self, node: DyadicInterval) -> u64 {
        let level = node.level as usize;
        if level >= self.levels.len() {
            return if node.index == 0 { self.total() } else { 0 };
        }
        usize::try_from(node.index)
            .ok()
            .and_then(|index| self.levels[level].get(index))
            .copied()
            .unwrap_or(0)
    }

    pub fn range_sum(&self, range: Range<u64>) -> u64 {
        decompose(range).into_iter().map(|node| self.weight(node)).sum()
    }
}
