//! Mergeable sketches over partitioned datasets, with progressive result streaming.
//!
//! A [`DataSet`] is a tree of partitions: local values, parallel groups and remote workers. A
//! [`Sketch`] is a commutative monoid over per-partition summaries. Running a sketch fans out to
//! every partition, merges results pairwise as they arrive, and streams ever more complete
//! [`SketchUpdate`]s to the caller until the single final value.

#![forbid(unsafe_code)]

mod dataset;
mod error;
mod parallel;
mod server;
mod sketch;
pub mod sketches;
mod stream;

pub use crate::dataset::{
    DataSet, ExecutionOptions, RemoteDataSet, Transport, WireReceiver, WireUpdate,
};
pub use crate::error::{Result, SketchError};
pub use crate::server::{SketchRegistry, SketchServer};
pub use crate::sketch::{OperationRequest, PartitionFlatMap, PartitionMap, Sketch};
pub use crate::sketches::{
    builtin_registry, AggregateSource, BucketsDescription, ColumnQuantization, DataRange,
    DataRangeSketch, Heatmap, HeatmapSketch, Histogram, HistogramSketch, ProjectMap, SampleMap,
    SummarySketch, TableSummary, MAX_QUANTIZATION_INTERVALS,
};
pub use crate::stream::{CancellationToken, ResultStream, SketchUpdate};
