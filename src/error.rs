//! Error types for the loan evaluation pipeline

use thiserror::Error;

/// Result type alias for loan-eval operations
pub type Result<T> = std::result::Result<T, LoanEvalError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum LoanEvalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Non-finite values after {0}")]
    NonFinite(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Metric error: {0}")]
    MetricError(String),

    #[error("Fairness error: {0}")]
    FairnessError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanEvalError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid_param(name: &str, value: impl ToString, reason: &str) -> Self {
        LoanEvalError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for LoanEvalError {
    fn from(err: polars::error::PolarsError) -> Self {
        LoanEvalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for LoanEvalError {
    fn from(err: serde_json::Error) -> Self {
        LoanEvalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LoanEvalError {
    fn from(err: ndarray::ShapeError) -> Self {
        LoanEvalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
