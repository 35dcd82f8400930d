use prism_columnar::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SketchError {
    #[error(transparent)]
    Table(#[from] TableError),

    /// Two partial results cannot be merged, e.g. summaries over different schemas.
    #[error("cannot combine results: {0}")]
    Combine(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local computation on one partition failed.
    #[error("partition computation failed: {0}")]
    Local(String),

    #[error("remote worker error: {0}")]
    Remote(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution ended without a final result")]
    Incomplete,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),
}

pub type Result<T> = std::result::Result<T, SketchError>;
