use crate::schema::ColumnDescription;
use crate::types::ColumnKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("schema mismatch: schema has {expected}, column has {actual}")]
    SchemaMismatch {
        expected: ColumnDescription,
        actual: ColumnDescription,
    },

    #[error("schema has {expected} columns, table was given {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column {column} has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("row {row} out of bounds for {size} physical rows")]
    RowOutOfBounds { row: usize, size: usize },

    #[error("value {value} cannot be stored in {kind} column {column}")]
    ValueKindMismatch {
        column: String,
        kind: ColumnKind,
        value: String,
    },

    #[error("row has {actual} values, schema has {expected} columns")]
    RowLengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, TableError>;
