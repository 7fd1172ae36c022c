//! Error types for the revenue_service crate

use revenue_forecast::ForecastError;
use thiserror::Error;

/// Errors surfaced by the forecasting service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Error from the forecasting models
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reading or writing CSV tables
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error reading or writing JSON artifacts
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request rejected before any model was consulted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ServiceError>;
