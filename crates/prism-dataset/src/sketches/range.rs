use super::DATA_RANGE;
use crate::error::{Result, SketchError};
use crate::sketch::{OperationRequest, Sketch};
use prism_columnar::Table;
use serde::{Deserialize, Serialize};

/// Extent of a numeric column, used to pick bucket boundaries before histogramming.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub present_count: u64,
    pub missing_count: u64,
}

impl DataRange {
    fn include(&mut self, value: f64) {
        self.min = Some(self.min.map_or(value, |min| min.min(value)));
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
        self.present_count += 1;
    }

    pub fn add(&self, other: &DataRange) -> DataRange {
        DataRange {
            min: pick(self.min, other.min, f64::min),
            max: pick(self.max, other.max, f64::max),
            present_count: self.present_count + other.present_count,
            missing_count: self.missing_count + other.missing_count,
        }
    }
}

fn pick(a: Option<f64>, b: Option<f64>, f: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRangeSketch {
    pub column: String,
}

impl DataRangeSketch {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl Sketch<Table> for DataRangeSketch {
    type Output = DataRange;

    fn zero(&self) -> DataRange {
        DataRange::default()
    }

    fn add(&self, left: &DataRange, right: &DataRange) -> Result<DataRange> {
        Ok(left.add(right))
    }

    fn create(&self, table: &Table) -> Result<DataRange> {
        let column = table.column(&self.column)?;
        if !column.kind().is_numeric() {
            return Err(SketchError::InvalidArgument(format!(
                "column `{}` of kind {} has no numeric range",
                self.column,
                column.kind()
            )));
        }
        let mut range = DataRange::default();
        for row in table.members().iter() {
            match column.as_f64(row) {
                Some(value) => range.include(value),
                None => range.missing_count += 1,
            }
        }
        Ok(range)
    }

    fn request(&self) -> Option<OperationRequest> {
        OperationRequest::new(DATA_RANGE, self).ok()
    }
}
