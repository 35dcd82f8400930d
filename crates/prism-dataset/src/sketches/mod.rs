//! Built-in sketches and partition maps over [`Table`].

mod buckets;
mod heatmap;
mod histogram;
mod range;
mod source;
mod summary;

pub use buckets::{BucketsDescription, ColumnQuantization, MAX_QUANTIZATION_INTERVALS};
pub use heatmap::{Heatmap, HeatmapSketch};
pub use histogram::{Histogram, HistogramSketch};
pub use range::{DataRange, DataRangeSketch};
pub use source::AggregateSource;
pub use summary::{SummarySketch, TableSummary};

use crate::error::{Result, SketchError};
use crate::server::SketchRegistry;
use crate::sketch::{OperationRequest, PartitionMap};
use prism_columnar::{Column, MembershipSet, SubSchema, Table};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const SUMMARY: &str = "summary";
pub const DATA_RANGE: &str = "dataRange";
pub const HISTOGRAM: &str = "histogram";
pub const HEATMAP: &str = "heatmap";
pub const SAMPLE: &str = "sample";
pub const PROJECT: &str = "project";

/// A registry that decodes every built-in sketch and map over tables.
pub fn builtin_registry() -> SketchRegistry<Table> {
    let mut registry = SketchRegistry::new();
    registry.register_sketch::<SummarySketch>(SUMMARY);
    registry.register_sketch::<DataRangeSketch>(DATA_RANGE);
    registry.register_sketch::<HistogramSketch>(HISTOGRAM);
    registry.register_sketch::<HeatmapSketch>(HEATMAP);
    registry.register_map::<SampleMap>(SAMPLE);
    registry.register_map::<ProjectMap>(PROJECT);
    registry
}

/// Replaces each partition by a uniform sample of at most `count` rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMap {
    pub count: usize,
    pub seed: u64,
}

impl PartitionMap<Table, Table> for SampleMap {
    fn apply(&self, table: &Table) -> Result<Table> {
        Ok(table.sample(self.count, self.seed))
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(SAMPLE, self).ok()
    }
}

/// Keeps only the named columns, compacting each partition to its member rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMap {
    pub columns: Vec<String>,
}

impl ProjectMap {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl PartitionMap<Table, Table> for ProjectMap {
    fn apply(&self, table: &Table) -> Result<Table> {
        for name in &self.columns {
            table.column_index(name)?;
        }
        let sub = SubSchema::columns(self.columns.iter().map(String::as_str));
        Ok(table.compress_with(&sub, table.members())?)
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(PROJECT, self).ok()
    }
}

pub(crate) fn numeric_column<'a>(table: &'a Table, name: &str) -> Result<&'a Column> {
    let column = table.column(name)?;
    if !column.kind().is_numeric() {
        return Err(SketchError::InvalidArgument(format!(
            "column `{name}` of kind {} cannot be bucketed",
            column.kind()
        )));
    }
    Ok(column)
}

/// The members to scan for a sampling `rate` in `(0, 1]`.
pub(crate) fn sampled_members(
    members: &MembershipSet,
    rate: f64,
    seed: u64,
) -> Result<Cow<'_, MembershipSet>> {
    if !(rate > 0.0 && rate <= 1.0) {
        return Err(SketchError::InvalidArgument(format!(
            "sampling rate must be in (0, 1], got {rate}"
        )));
    }
    if rate == 1.0 {
        return Ok(Cow::Borrowed(members));
    }
    let k = (members.size() as f64 * rate).ceil() as usize;
    Ok(Cow::Owned(members.sample(k, seed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_keeps_schema_order_and_members() {
        let table = Table::with_all_rows(vec![
            Column::integers("a", vec![1, 2, 3]),
            Column::strings("b", &["x", "y", "z"]),
        ])
        .unwrap()
        .filter(|row| row != 1);
        let projected = ProjectMap::new(["b"]).apply(&table).unwrap();
        assert_eq!(projected.row_count(), 2);
        assert_eq!(projected.column_count(), 1);
        assert_eq!(projected.column("b").unwrap().as_string(1), "z");
    }

    #[test]
    fn project_rejects_unknown_columns() {
        let table = Table::with_all_rows(vec![Column::integers("a", vec![1])]).unwrap();
        assert!(matches!(
            ProjectMap::new(["nope"]).apply(&table),
            Err(SketchError::Table(_))
        ));
    }

    #[test]
    fn builtin_registry_knows_every_kind() {
        let registry = builtin_registry();
        for kind in [SUMMARY, DATA_RANGE, HISTOGRAM, HEATMAP] {
            assert!(registry.has_sketch(kind), "{kind}");
        }
        assert!(registry.has_map(SAMPLE));
        assert!(registry.has_map(PROJECT));
    }
}
