//! # Revenue Math
//!
//! Numerical building blocks used by the revenue forecasting models.
//! This crate provides the lag-polynomial algebra behind seasonal ARIMA,
//! a derivative-free simplex optimizer and the residual statistics used
//! for model diagnostics.

use thiserror::Error;

pub mod optimization;
pub mod polynomial;
pub mod statistics;

/// Errors that can occur in numerical calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
