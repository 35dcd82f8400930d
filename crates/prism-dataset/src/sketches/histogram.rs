use super::buckets::{BucketsDescription, ColumnQuantization};
use super::source::AggregateSource;
use super::{numeric_column, sampled_members, HISTOGRAM};
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, Sketch};
use prism_columnar::Table;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-bucket counts of one numeric column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub counts: Vec<u64>,
    /// Rows whose value is missing.
    pub missing: u64,
    /// Present values outside the bucket range (or the quantization domain).
    pub out_of_range: u64,
}

impl Histogram {
    pub fn zero(bucket_count: usize) -> Self {
        Self {
            counts: vec![0; bucket_count],
            missing: 0,
            out_of_range: 0,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    /// Rows that landed in some bucket.
    pub fn in_range(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn add(&self, other: &Histogram) -> Result<Histogram> {
        if self.counts.len() != other.counts.len() {
            return Err(SketchError::Combine(format!(
                "histograms have {} and {} buckets",
                self.counts.len(),
                other.counts.len()
            )));
        }
        Ok(Histogram {
            counts: self
                .counts
                .iter()
                .zip(&other.counts)
                .map(|(a, b)| a + b)
                .collect(),
            missing: self.missing + other.missing,
            out_of_range: self.out_of_range + other.out_of_range,
        })
    }
}

fn default_sampling_rate() -> f64 {
    1.0
}

/// Buckets every (sampled) row of `column`.
///
/// With a quantization, values are first snapped to the start of their quantization interval;
/// values outside the quantization domain count as out of range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramSketch {
    pub column: String,
    pub buckets: BucketsDescription,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub quantization: Option<ColumnQuantization>,
}

impl HistogramSketch {
    pub fn new(column: impl Into<String>, buckets: BucketsDescription) -> Self {
        Self {
            column: column.into(),
            buckets,
            sampling_rate: 1.0,
            seed: 0,
            quantization: None,
        }
    }

    /// Count only a uniform sample of `rate` of each partition's rows. Counts are not rescaled.
    pub fn with_sampling(mut self, rate: f64, seed: u64) -> Self {
        self.sampling_rate = rate;
        self.seed = seed;
        self
    }

    pub fn with_quantization(mut self, quantization: ColumnQuantization) -> Self {
        self.quantization = Some(quantization);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.buckets.validate()?;
        if let Some(quantization) = &self.quantization {
            quantization.validate()?;
        }
        Ok(())
    }

    pub(crate) fn bucket_of(&self, value: f64) -> Option<usize> {
        bucket_of(&self.buckets, self.quantization.as_ref(), value)
    }

    /// Scan the member rows of `table`.
    pub fn scan(&self, table: &Table) -> Result<Histogram> {
        self.validate()?;
        let column = numeric_column(table, &self.column)?;
        let members = sampled_members(table.members(), self.sampling_rate, self.seed)?;

        let mut histogram = Histogram::zero(self.buckets.count);
        for row in members.iter() {
            match column.as_f64(row) {
                None => histogram.missing += 1,
                Some(value) => match self.bucket_of(value) {
                    Some(bucket) => histogram.counts[bucket] += 1,
                    None => histogram.out_of_range += 1,
                },
            }
        }
        Ok(histogram)
    }
}

pub(crate) fn bucket_of(
    buckets: &BucketsDescription,
    quantization: Option<&ColumnQuantization>,
    value: f64,
) -> Option<usize> {
    let value = match quantization {
        Some(quantization) => quantization.quantize(value)?,
        None => value,
    };
    buckets.index_of(value)
}

impl Sketch<Table> for HistogramSketch {
    type Output = Histogram;

    fn zero(&self) -> Histogram {
        Histogram::zero(self.buckets.count)
    }

    fn add(&self, left: &Histogram, right: &Histogram) -> Result<Histogram> {
        left.add(right)
    }

    fn create(&self, table: &Table) -> Result<Histogram> {
        self.scan(table)
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(HISTOGRAM, self).ok()
    }
}

impl Sketch<Arc<dyn AggregateSource>> for HistogramSketch {
    type Output = Histogram;

    fn zero(&self) -> Histogram {
        Histogram::zero(self.buckets.count)
    }

    fn add(&self, left: &Histogram, right: &Histogram) -> Result<Histogram> {
        left.add(right)
    }

    fn create(&self, source: &Arc<dyn AggregateSource>) -> Result<Histogram> {
        self.validate()?;
        let histogram = source.histogram(self)?;
        if histogram.bucket_count() != self.buckets.count {
            return Err(SketchError::InvalidArgument(format!(
                "source returned {} buckets, expected {}",
                histogram.bucket_count(),
                self.buckets.count
            )));
        }
        Ok(histogram)
    }
}
