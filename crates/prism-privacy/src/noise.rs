//! Deterministic Laplace noise.
//!
//! Every noise value is a pure function of `(seed, key, coordinates)`: asking for the same tree
//! node twice returns the same sample, so repeated queries over the same column cannot be
//! averaged to strip the noise.

use crate::error::{PrivacyError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, Laplace};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoiseGenerator {
    seed: u64,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A Laplace(0, `scale`) sample for the node at `coordinates` of the tree named `key`.
    pub fn sample(&self, key: &str, coordinates: &[u64], scale: f64) -> Result<f64> {
        let laplace = Laplace::new(0.0, scale).map_err(|_| PrivacyError::InvalidEpsilon {
            key: key.to_string(),
            value: 1.0 / scale,
        })?;
        let mut state = splitmix64(self.seed ^ fnv1a(key));
        for &coordinate in coordinates {
            state = splitmix64(state ^ coordinate);
        }
        let mut rng = StdRng::seed_from_u64(state);
        // Open interval: the inverse CDF diverges at 0 and 1.
        let u = rng.gen_range(f64::EPSILON..1.0);
        Ok(laplace.inverse_cdf(u))
    }
}

/// Laplace scale for each node of a one-dimensional tree with `levels` levels.
///
/// A row contributes to one node per level, so the budget is split evenly across levels.
pub fn histogram_scale(levels: u32, epsilon: f64) -> f64 {
    f64::from(levels.max(1)) / epsilon
}

/// Laplace scale for each node pair of two trees.
pub fn heatmap_scale(x_levels: u32, y_levels: u32, epsilon: f64) -> f64 {
    f64::from(x_levels.max(1)) * f64::from(y_levels.max(1)) / epsilon
}

pub fn laplace_variance(scale: f64) -> f64 {
    2.0 * scale * scale
}

/// Half-width of the reported confidence band for a sum with the given variance.
pub fn confidence(variance: f64) -> f64 {
    2.0 * variance.sqrt()
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// FNV-1a keeps keys stable across runs and platforms.
fn fnv1a(s: &str) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}
