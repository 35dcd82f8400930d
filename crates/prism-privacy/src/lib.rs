//! Differentially private views of histogram and heatmap sketches.
//!
//! A plain sketch is computed once over the public buckets, with values snapped to the
//! column's quantization. The quantization intervals are the leaves of a dyadic tree; each
//! bucket count then gets the noise of the tree nodes covering its leaves. No data is read
//! after noise is added.

#![forbid(unsafe_code)]

mod dyadic;
mod error;
mod heatmap;
mod histogram;
mod noise;
mod schema;
mod wrapper;

pub use dyadic::{
    decompose, heatmap_sketch, DyadicInterval, DyadicTree, NumericDyadicDecomposition,
};
pub use error::{PrivacyError, Result};
pub use heatmap::PrivateHeatmap;
pub use histogram::PrivateHistogram;
pub use noise::{
    confidence, heatmap_scale, histogram_scale, laplace_variance, NoiseGenerator,
};
pub use schema::PrivacySchema;
pub use wrapper::{PrivacyConfig, PrivacyPostProcessor};
