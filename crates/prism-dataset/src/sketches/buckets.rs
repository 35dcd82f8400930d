use crate::error::{Result, SketchError};
use serde::{Deserialize, Serialize};

/// Equal-width bucketing of `[min, max]` into `count` buckets.
///
/// Buckets are half-open except the last, which also holds `max`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BucketsDescription {
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl BucketsDescription {
    pub fn new(min: f64, max: f64, count: usize) -> Result<Self> {
        let buckets = Self { min, max, count };
        buckets.validate()?;
        Ok(buckets)
    }

    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(SketchError::InvalidArgument(
                "bucket count must be positive".to_string(),
            ));
        }
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(SketchError::InvalidArgument(format!(
                "invalid bucket range [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.count as f64
    }

    /// Bucket holding `value`, or `None` when it lies outside `[min, max]`.
    pub fn index_of(&self, value: f64) -> Option<usize> {
        if value.is_nan() || value < self.min || value > self.max {
            return None;
        }
        if self.max == self.min {
            return Some(0);
        }
        let index = ((value - self.min) / self.width()) as usize;
        Some(index.min(self.count - 1))
    }

    /// `[low, high)` bounds of bucket `index`.
    pub fn bucket_bounds(&self, index: usize) -> (f64, f64) {
        let width = self.width();
        let low = self.min + width * index as f64;
        (low, low + width)
    }
}

/// Upper bound on [`ColumnQuantization::interval_count`].
pub const MAX_QUANTIZATION_INTERVALS: usize = 1 << 28;

/// Discretization of a numeric column onto `globalMin + k * granularity`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnQuantization {
    pub granularity: f64,
    pub global_min: f64,
    pub global_max: f64,
}

impl ColumnQuantization {
    pub fn new(granularity: f64, global_min: f64, global_max: f64) -> Result<Self> {
        let quantization = Self {
            granularity,
            global_min,
            global_max,
        };
        quantization.validate()?;
        Ok(quantization)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.granularity.is_finite() && self.granularity > 0.0) {
            return Err(SketchError::InvalidArgument(format!(
                "granularity must be positive, got {}",
                self.granularity
            )));
        }
        if !self.global_min.is_finite()
            || !self.global_max.is_finite()
            || self.global_min > self.global_max
        {
            return Err(SketchError::InvalidArgument(format!(
                "invalid quantization range [{}, {}]",
                self.global_min, self.global_max
            )));
        }
        let steps = ((self.global_max - self.global_min) / self.granularity).floor();
        if !(steps < MAX_QUANTIZATION_INTERVALS as f64) {
            return Err(SketchError::InvalidArgument(format!(
                "quantization of [{}, {}] by {} exceeds {MAX_QUANTIZATION_INTERVALS} intervals",
                self.global_min, self.global_max, self.granularity
            )));
        }
        Ok(())
    }

    /// Number of quantization intervals covering `[globalMin, globalMax]`.
    ///
    /// Saturates for quantizations that fail [`ColumnQuantization::validate`].
    pub fn interval_count(&self) -> usize {
        let steps = ((self.global_max - self.global_min) / self.granularity).floor() as usize;
        steps.saturating_add(1)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.global_min && value <= self.global_max
    }

    /// Interval holding `value`, or `None` when it is out of range.
    pub fn interval_index(&self, value: f64) -> Option<usize> {
        if !self.contains(value) {
            return None;
        }
        let index = ((value - self.global_min) / self.granularity).floor() as usize;
        Some(index.min(self.interval_count() - 1))
    }

    pub fn interval_start(&self, index: usize) -> f64 {
        self.global_min + self.granularity * index as f64
    }

    /// Snap `value` down to the start of its interval.
    pub fn quantize(&self, value: f64) -> Option<f64> {
        self.interval_index(value)
            .map(|index| self.interval_start(index))
    }
}
