use crate::dyadic::{heatmap_sketch, NumericDyadicDecomposition};
use crate::error::Result;
use crate::heatmap::PrivateHeatmap;
use crate::histogram::PrivateHistogram;
use crate::noise::NoiseGenerator;
use crate::schema::{pair_key, PrivacySchema};
use lru::LruCache;
use prism_columnar::Table;
use prism_dataset::{BucketsDescription, ColumnQuantization, DataSet, Heatmap, Histogram};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivacyConfig {
    /// Seeds every noise sample; the same seed reproduces the same private results.
    pub seed: u64,
    /// Number of dyadic decompositions kept for reuse.
    pub cache_entries: usize,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            cache_entries: 64,
        }
    }
}

/// Bit patterns of a (quantization, buckets) pair.
type DecompositionKey = [u64; 6];

fn decomposition_key(
    quantization: &ColumnQuantization,
    buckets: &BucketsDescription,
) -> DecompositionKey {
    [
        quantization.granularity.to_bits(),
        quantization.global_min.to_bits(),
        quantization.global_max.to_bits(),
        buckets.min.to_bits(),
        buckets.max.to_bits(),
        buckets.count as u64,
    ]
}

/// Turns plain histogram and heatmap results into differentially private ones.
///
/// Each column's budget comes from the [`PrivacySchema`] alone; repeated queries are not
/// charged against it.
pub struct PrivacyPostProcessor {
    schema: PrivacySchema,
    noise: NoiseGenerator,
    decompositions: Mutex<LruCache<DecompositionKey, Arc<NumericDyadicDecomposition>>>,
}

impl fmt::Debug for PrivacyPostProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .decompositions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("PrivacyPostProcessor")
            .field("schema", &self.schema)
            .field("noise", &self.noise)
            .field("cached_decompositions", &cached)
            .finish()
    }
}

impl PrivacyPostProcessor {
    pub fn new(schema: PrivacySchema, config: PrivacyConfig) -> Result<Self> {
        schema.validate()?;
        let capacity = NonZeroUsize::new(config.cache_entries).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            schema,
            noise: NoiseGenerator::new(config.seed),
            decompositions: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn schema(&self) -> &PrivacySchema {
        &self.schema
    }

    /// The decomposition of `column` under `buckets`, built on first use.
    pub fn decomposition(
        &self,
        column: &str,
        buckets: &BucketsDescription,
    ) -> Result<Arc<NumericDyadicDecomposition>> {
        let quantization = *self.schema.quantization(column)?;
        let key = decomposition_key(&quantization, buckets);
        if let Some(found) = self
            .decompositions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(found));
        }

        let built = Arc::new(NumericDyadicDecomposition::new(quantization, *buckets)?);
        self.decompositions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, Arc::clone(&built));
        Ok(built)
    }

    /// Noises a histogram of `column` over `buckets` computed with the column's quantization
    /// (see [`NumericDyadicDecomposition::histogram_sketch`]).
    pub fn private_histogram(
        &self,
        column: &str,
        buckets: &BucketsDescription,
        counts: &Histogram,
        with_cdf: bool,
    ) -> Result<PrivateHistogram> {
        let epsilon = self.schema.epsilon(column)?;
        let decomposition = self.decomposition(column, buckets)?;
        PrivateHistogram::from_buckets(
            &decomposition,
            counts,
            epsilon,
            &self.noise,
            column,
            with_cdf,
        )
    }

    /// Noises a heatmap computed with the quantization of both columns
    /// (see [`crate::heatmap_sketch`]).
    pub fn private_heatmap(
        &self,
        x_column: &str,
        x_buckets: &BucketsDescription,
        y_column: &str,
        y_buckets: &BucketsDescription,
        counts: &Heatmap,
    ) -> Result<PrivateHeatmap> {
        let epsilon = self.schema.epsilon_pair(x_column, y_column)?;
        let x = self.decomposition(x_column, x_buckets)?;
        let y = self.decomposition(y_column, y_buckets)?;
        PrivateHeatmap::from_buckets(
            &x,
            &y,
            counts,
            epsilon,
            &self.noise,
            &pair_key(x_column, y_column),
        )
    }

    /// Computes and noises a histogram of `column` over `data`.
    pub async fn histogram(
        &self,
        data: &DataSet<Table>,
        column: &str,
        buckets: &BucketsDescription,
        with_cdf: bool,
    ) -> Result<PrivateHistogram> {
        let decomposition = self.decomposition(column, buckets)?;
        log::debug!(
            "private histogram of `{column}`: {} buckets over {} leaves",
            buckets.count,
            decomposition.leaf_count()
        );
        let sketch = Arc::new(decomposition.histogram_sketch(column));
        let counts = data.sketch_final(sketch).await?;
        self.private_histogram(column, buckets, &counts, with_cdf)
    }

    /// Computes and noises a heatmap of `x_column` against `y_column` over `data`.
    pub async fn heatmap(
        &self,
        data: &DataSet<Table>,
        x_column: &str,
        x_buckets: &BucketsDescription,
        y_column: &str,
        y_buckets: &BucketsDescription,
    ) -> Result<PrivateHeatmap> {
        let x = self.decomposition(x_column, x_buckets)?;
        let y = self.decomposition(y_column, y_buckets)?;
        log::debug!(
            "private heatmap of `{x_column}` x `{y_column}`: {}x{} buckets",
            x_buckets.count,
            y_buckets.count
        );
        let sketch = Arc::new(heatmap_sketch(x_column, &x, y_column, &y));
        let counts = data.sketch_final(sketch).await?;
        self.private_heatmap(x_column, x_buckets, y_column, y_buckets, &counts)
    }
}
