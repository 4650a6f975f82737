//! Error types for the performance tooling

use thiserror::Error;

/// Crate error type.
///
/// Zero-denominator ratios are not errors: they surface as NaN in
/// [`crate::metrics::performance::Metrics`] and in ROC rows.
#[derive(Error, Debug)]
pub enum Error {
    /// Argument outside its allowed domain (fraction goal, split modulus, ...)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required column is absent from an input table
    #[error("schema mismatch: column `{column}` missing from {context}")]
    SchemaMismatch { column: String, context: String },

    /// A cell holds a value its column cannot take
    #[error("invalid value {value} in column `{column}`, row {row} of {context}")]
    InvalidValue { column: String, row: usize, value: f64, context: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Blob encoding error
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

impl Error {
    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        Error::SchemaMismatch { column: column.into(), context: context.into() }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
