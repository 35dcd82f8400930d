use prism_dataset::SketchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivacyError {
    #[error("cannot read privacy schema: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed privacy schema: {0}")]
    Json(#[from] serde_json::Error),

    #[error("epsilon for `{key}` must be positive and finite, got {value}")]
    InvalidEpsilon { key: String, value: f64 },

    #[error("no quantization for column `{0}`")]
    MissingQuantization(String),

    /// Epsilon keys name one column or two joined by `+`.
    #[error("malformed epsilon key `{0}`")]
    MalformedKey(String),

    #[error("invalid quantization for `{column}`: {reason}")]
    InvalidQuantization { column: String, reason: String },

    #[error("no epsilon for `{0}` and no default for its arity")]
    NoEpsilon(String),

    #[error("expected {expected} bucket counts, got {actual}")]
    BucketCountMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Sketch(#[from] SketchError),
}

pub type Result<T> = std::result::Result<T, PrivacyError>;
