//! Error types for the pricecast training pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PricecastError>;

/// Main error type for the training pipeline
#[derive(Error, Debug)]
pub enum PricecastError {
    #[error("Data format error: {0}")]
    DataFormat(String),

    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Schema mismatch: fitted columns absent from input: {0:?}")]
    SchemaMismatch(Vec<String>),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Registration failed: {0}")]
    Registration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transformer or model not fitted")]
    NotFitted,

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for PricecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        PricecastError::DataFormat(err.to_string())
    }
}

impl From<serde_json::Error> for PricecastError {
    fn from(err: serde_json::Error) -> Self {
        PricecastError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PricecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        PricecastError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
