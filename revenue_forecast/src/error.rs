//! Error types for the revenue_forecast crate

use polars::prelude::PolarsError;
use revenue_math::MathError;
use thiserror::Error;

/// Custom error types for the revenue_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed input series (unparsable dates, wrong column layout, empty after alignment)
    #[error("Data format error: {0}")]
    DataFormatError(String),

    /// Series shorter than the model requires
    #[error("Insufficient data: {0}")]
    InsufficientDataError(String),

    /// Optimizer or solver failure while fitting
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Operation that needs a fitted model was called before `fit`
    #[error("Model not fitted: {0}")]
    NotFittedError(String),

    /// Test data cannot be evaluated against the fitted model
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numerical routines
    #[error("Math error: {0}")]
    MathError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from (de)serializing fitted state
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientData(msg) => ForecastError::InsufficientDataError(msg),
            other => ForecastError::MathError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
