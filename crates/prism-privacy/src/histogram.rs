use crate::dyadic::{DyadicInterval, NumericDyadicDecomposition};
use crate::error::{PrivacyError, Result};
use crate::noise::{confidence, histogram_scale, laplace_variance, NoiseGenerator};
use prism_dataset::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A noised histogram over public buckets.
///
/// Counts are not rounded and may be negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateHistogram {
    pub counts: Vec<f64>,
    /// Per-bucket half-width of the noise band.
    pub confidence: Vec<f64>,
    /// Noised running totals; each prefix is noised as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdf: Option<Vec<f64>>,
    pub missing: f64,
    pub epsilon: f64,
}

impl PrivateHistogram {
    /// Noises `counts`, a histogram over the decomposition's public buckets computed with its
    /// quantization (see [`NumericDyadicDecomposition::histogram_sketch`]).
    ///
    /// A bucket gets one noise sample per dyadic node covering its leaves; a prefix gets one
    /// per node covering the prefix. Nodes shared between outputs share their sample.
    pub fn from_buckets(
        decomposition: &NumericDyadicDecomposition,
        counts: &Histogram,
        epsilon: f64,
        noise: &NoiseGenerator,
        key: &str,
        with_cdf: bool,
    ) -> Result<Self> {
        let bucket_count = decomposition.bucket_count();
        if counts.counts.len() != bucket_count {
            return Err(PrivacyError::BucketCountMismatch {
                expected: bucket_count,
                actual: counts.counts.len(),
            });
        }

        let scale = histogram_scale(decomposition.levels(), epsilon);
        let node_variance = laplace_variance(scale);
        let mut node_noise = NodeNoise {
            noise,
            key,
            scale,
            cache: HashMap::new(),
        };

        let mut noised = Vec::with_capacity(bucket_count);
        let mut bands = Vec::with_capacity(bucket_count);
        for (bucket, &exact) in counts.counts.iter().enumerate() {
            let nodes = decomposition.bucket_nodes(bucket);
            noised.push(exact as f64 + node_noise.sum(&nodes)?);
            bands.push(confidence(nodes.len() as f64 * node_variance));
        }

        let cdf = if with_cdf {
            let mut cdf = Vec::with_capacity(bucket_count);
            let mut running = 0u64;
            for (bucket, &exact) in counts.counts.iter().enumerate() {
                running += exact;
                let nodes = decomposition.prefix_nodes(bucket);
                cdf.push(running as f64 + node_noise.sum(&nodes)?);
            }
            Some(cdf)
        } else {
            None
        };

        let missing = counts.missing as f64 + noise.sample(key, &[u64::MAX], 1.0 / epsilon)?;

        Ok(Self {
            counts: noised,
            confidence: bands,
            cdf,
            missing,
            epsilon,
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// Noise samples of 1-D tree nodes, drawn once per node.
struct NodeNoise<'a> {
    noise: &'a NoiseGenerator,
    key: &'a str,
    scale: f64,
    cache: HashMap<DyadicInterval, f64>,
}

impl NodeNoise<'_> {
    fn get(&mut self, node: DyadicInterval) -> Result<f64> {
        if let Some(&value) = self.cache.get(&node) {
            return Ok(value);
        }
        let value = self
            .noise
            .sample(self.key, &[u64::from(node.level), node.index], self.scale)?;
        self.cache.insert(node, value);
        Ok(value)
    }

    fn sum(&mut self, nodes: &[DyadicInterval]) -> Result<f64> {
        nodes.iter().try_fold(0.0, |acc, &node| Ok(acc + self.get(node)?))
    }
}
