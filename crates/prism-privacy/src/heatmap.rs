use crate::dyadic::NumericDyadicDecomposition;
use crate::error::{PrivacyError, Result};
use crate::noise::{confidence, heatmap_scale, laplace_variance, NoiseGenerator};
use prism_dataset::Heatmap;
use serde::{Deserialize, Serialize};

/// A noised heatmap; counts are row-major like [`Heatmap`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateHeatmap {
    pub x_buckets: usize,
    pub y_buckets: usize,
    pub counts: Vec<f64>,
    pub confidence: Vec<f64>,
    pub epsilon: f64,
}

impl PrivateHeatmap {
    /// Noises `counts`, a heatmap over the public buckets of `x` and `y` computed with both
    /// quantizations (see [`crate::heatmap_sketch`]).
    ///
    /// Each cell gets one noise sample per pair of x and y nodes covering its leaf rectangle.
    pub fn from_buckets(
        x: &NumericDyadicDecomposition,
        y: &NumericDyadicDecomposition,
        counts: &Heatmap,
        epsilon: f64,
        noise: &NoiseGenerator,
        key: &str,
    ) -> Result<Self> {
        let expected = x.bucket_count() * y.bucket_count();
        if counts.x_buckets != x.bucket_count()
            || counts.y_buckets != y.bucket_count()
            || counts.counts.len() != expected
        {
            return Err(PrivacyError::BucketCountMismatch {
                expected,
                actual: counts.counts.len(),
            });
        }
        let scale = heatmap_scale(x.levels(), y.levels(), epsilon);
        let node_variance = laplace_variance(scale);

        let y_nodes_per_bucket: Vec<_> = (0..y.bucket_count()).map(|b| y.bucket_nodes(b)).collect();
        let mut noised = Vec::with_capacity(expected);
        let mut bands = Vec::with_capacity(expected);
        let mut exact = counts.counts.iter();
        for bx in 0..x.bucket_count() {
            let x_nodes = x.bucket_nodes(bx);
            for y_nodes in &y_nodes_per_bucket {
                let mut count = exact.next().copied().unwrap_or(0) as f64;
                for nx in &x_nodes {
                    for ny in y_nodes {
                        let coordinates =
                            [u64::from(nx.level), nx.index, u64::from(ny.level), ny.index];
                        count += noise.sample(key, &coordinates, scale)?;
                    }
                }
                noised.push(count);
                let pairs = (x_nodes.len() * y_nodes.len()) as f64;
                bands.push(confidence(pairs * node_variance));
            }
        }

        Ok(Self {
            x_buckets: x.bucket_count(),
            y_buckets: y.bucket_count(),
            counts: noised,
            confidence: bands,
            epsilon,
        })
    }

    /// Noised count of cell `(x, y)`, or `None` outside the grid.
    pub fn count(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.x_buckets || y >= self.y_buckets {
            return None;
        }
        self.counts.get(x * self.y_buckets + y).copied()
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}
