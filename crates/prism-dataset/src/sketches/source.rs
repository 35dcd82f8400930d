use super::heatmap::{Heatmap, HeatmapSketch};
use super::histogram::{Histogram, HistogramSketch};
use crate::error::Result;
use prism_columnar::{Schema, Table};
use std::fmt;

/// A partition whose aggregates are answered by an external query engine instead of a row
/// scan.
///
/// Results must have exactly the shape the same sketch produces over a [`Table`], so that
/// both kinds of partition combine through the same protocol.
pub trait AggregateSource: Send + Sync + fmt::Debug {
    fn schema(&self) -> Result<Schema>;

    fn row_count(&self) -> Result<u64>;

    fn histogram(&self, sketch: &HistogramSketch) -> Result<Histogram>;

    fn heatmap(&self, sketch: &HeatmapSketch) -> Result<Heatmap>;
}

/// In-memory tables answer aggregate queries by scanning.
impl AggregateSource for Table {
    fn schema(&self) -> Result<Schema> {
        Ok(Table::schema(self).clone())
    }

    fn row_count(&self) -> Result<u64> {
        Ok(Table::row_count(self) as u64)
    }

    fn histogram(&self, sketch: &HistogramSketch) -> Result<Histogram> {
        sketch.scan(self)
    }

    fn heatmap(&self, sketch: &HeatmapSketch) -> Result<Heatmap> {
        sketch.scan(self)
    }
}
