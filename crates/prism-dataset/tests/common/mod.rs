#![allow(dead_code)]

use prism_columnar::{Column, Table};
use prism_dataset::{DataSet, Result, Sketch};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A table with one Double column `v` holding `start..start + len` and one Integer column `k`
/// holding `value % 7`.
pub fn range_table(start: usize, len: usize) -> Table {
    let values: Vec<f64> = (start..start + len).map(|v| v as f64).collect();
    let keys: Vec<i64> = (start..start + len).map(|v| (v % 7) as i64).collect();
    Table::with_all_rows(vec![Column::doubles("v", values), Column::integers("k", keys)])
        .expect("valid table")
}

/// Partitions of `0..total` with the given sizes, as a flat parallel node.
pub fn split_dataset(sizes: &[usize]) -> DataSet<Table> {
    let mut start = 0;
    let mut children = Vec::new();
    for &len in sizes {
        children.push(DataSet::local(range_table(start, len)));
        start += len;
    }
    DataSet::parallel(children)
}

/// Wraps a sketch and sleeps a random few milliseconds before each local computation, so that
/// partitions finish in varying order.
pub struct DelayedSketch<S> {
    pub inner: S,
    pub max_delay_ms: u64,
    seed: AtomicU64,
}

impl<S> DelayedSketch<S> {
    pub fn new(inner: S, max_delay_ms: u64) -> Self {
        Self {
            inner,
            max_delay_ms,
            seed: AtomicU64::new(1),
        }
    }
}

impl<T, S: Sketch<T>> Sketch<T> for DelayedSketch<S> {
    type Output = S::Output;

    fn zero(&self) -> S::Output {
        self.inner.zero()
    }

    fn add(&self, left: &S::Output, right: &S::Output) -> Result<S::Output> {
        self.inner.add(left, right)
    }

    fn create(&self, data: &T) -> Result<S::Output> {
        let seed = self.seed.fetch_add(1, Ordering::Relaxed);
        let delay = StdRng::seed_from_u64(seed).gen_range(0..=self.max_delay_ms);
        std::thread::sleep(Duration::from_millis(delay));
        self.inner.create(data)
    }
}

/// Counts local computations; each partition contributes 1.
#[derive(Default)]
pub struct CountingSketch {
    pub created: Arc<AtomicU64>,
}

impl Sketch<Table> for CountingSketch {
    type Output = u64;

    fn zero(&self) -> u64 {
        0
    }

    fn add(&self, left: &u64, right: &u64) -> Result<u64> {
        Ok(left + right)
    }

    fn create(&self, _: &Table) -> Result<u64> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }
}
