use super::buckets::{BucketsDescription, ColumnQuantization};
use super::histogram::bucket_of;
use super::source::AggregateSource;
use super::{numeric_column, sampled_members, HEATMAP};
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, Sketch};
use prism_columnar::Table;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Joint bucket counts of two numeric columns, stored row-major by x bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    pub x_buckets: usize,
    pub y_buckets: usize,
    pub counts: Vec<u64>,
    /// Rows where either value is missing.
    pub missing: u64,
    pub out_of_range: u64,
}

impl Heatmap {
    pub fn zero(x_buckets: usize, y_buckets: usize) -> Self {
        Self {
            x_buckets,
            y_buckets,
            counts: vec![0; x_buckets * y_buckets],
            missing: 0,
            out_of_range: 0,
        }
    }

    /// Count of cell `(x, y)`, or `None` outside the grid.
    pub fn count(&self, x: usize, y: usize) -> Option<u64> {
        if x >= self.x_buckets || y >= self.y_buckets {
            return None;
        }
        self.counts.get(x * self.y_buckets + y).copied()
    }

    fn increment(&mut self, x: usize, y: usize) {
        self.counts[x * self.y_buckets + y] += 1;
    }

    pub fn add(&self, other: &Heatmap) -> Result<Heatmap> {
        if (self.x_buckets, self.y_buckets) != (other.x_buckets, other.y_buckets) {
            return Err(SketchError::Combine(format!(
                "heatmaps are {}x{} and {}x{}",
                self.x_buckets, self.y_buckets, other.x_buckets, other.y_buckets
            )));
        }
        Ok(Heatmap {
            x_buckets: self.x_buckets,
            y_buckets: self.y_buckets,
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

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapSketch {
    pub x_column: String,
    pub y_column: String,
    pub x_buckets: BucketsDescription,
    pub y_buckets: BucketsDescription,
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub x_quantization: Option<ColumnQuantization>,
    #[serde(default)]
    pub y_quantization: Option<ColumnQuantization>,
}

impl HeatmapSketch {
    pub fn new(
        x_column: impl Into<String>,
        x_buckets: BucketsDescription,
        y_column: impl Into<String>,
        y_buckets: BucketsDescription,
    ) -> Self {
        Self {
            x_column: x_column.into(),
            y_column: y_column.into(),
            x_buckets,
            y_buckets,
            sampling_rate: 1.0,
            seed: 0,
            x_quantization: None,
            y_quantization: None,
        }
    }

    pub fn with_sampling(mut self, rate: f64, seed: u64) -> Self {
        self.sampling_rate = rate;
        self.seed = seed;
        self
    }

    pub fn with_quantization(mut self, x: ColumnQuantization, y: ColumnQuantization) -> Self {
        self.x_quantization = Some(x);
        self.y_quantization = Some(y);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.x_buckets.validate()?;
        self.y_buckets.validate()?;
        for quantization in [&self.x_quantization, &self.y_quantization]
            .into_iter()
            .flatten()
        {
            quantization.validate()?;
        }
        Ok(())
    }

    fn zero_heatmap(&self) -> Heatmap {
        Heatmap::zero(self.x_buckets.count, self.y_buckets.count)
    }

    pub fn scan(&self, table: &Table) -> Result<Heatmap> {
        self.validate()?;
        let x_column = numeric_column(table, &self.x_column)?;
        let y_column = numeric_column(table, &self.y_column)?;
        let members = sampled_members(table.members(), self.sampling_rate, self.seed)?;

        let mut heatmap = self.zero_heatmap();
        for row in members.iter() {
            let (Some(x), Some(y)) = (x_column.as_f64(row), y_column.as_f64(row)) else {
                heatmap.missing += 1;
                continue;
            };
            let x = bucket_of(&self.x_buckets, self.x_quantization.as_ref(), x);
            let y = bucket_of(&self.y_buckets, self.y_quantization.as_ref(), y);
            match (x, y) {
                (Some(x), Some(y)) => heatmap.increment(x, y),
                _ => heatmap.out_of_range += 1,
            }
        }
        Ok(heatmap)
    }
}

impl Sketch<Table> for HeatmapSketch {
    type Output = Heatmap;

    fn zero(&self) -> Heatmap {
        self.zero_heatmap()
    }

    fn add(&self, left: &Heatmap, right: &Heatmap) -> Result<Heatmap> {
        left.add(right)
    }

    fn create(&self, table: &Table) -> Result<Heatmap> {
        self.scan(table)
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(HEATMAP, self).ok()
    }
}

impl Sketch<Arc<dyn AggregateSource>> for HeatmapSketch {
    type Output = Heatmap;

    fn zero(&self) -> Heatmap {
        self.zero_heatmap()
    }

    fn add(&self, left: &Heatmap, right: &Heatmap) -> Result<Heatmap> {
        left.add(right)
    }

    fn create(&self, source: &Arc<dyn AggregateSource>) -> Result<Heatmap> {
        self.validate()?;
        let heatmap = source.heatmap(self)?;
        if heatmap.counts.len() != self.x_buckets.count * self.y_buckets.count {
            return Err(SketchError::InvalidArgument(format!(
                "source returned {} cells, expected {}x{}",
                heatmap.counts.len(),
                self.x_buckets.count,
                self.y_buckets.count
            )));
        }
        Ok(heatmap)
    }
}
