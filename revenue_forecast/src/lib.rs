//! # Revenue Forecast
//!
//! Monthly revenue forecasting with two model families.
//!
//! ## Features
//!
//! - Loading (date, revenue) tables into gap-free monthly series
//! - Reversible min-max scaling
//! - An LSTM sequence forecaster rolled forward one month at a time
//! - A seasonal ARIMA forecaster with native confidence bounds
//! - Evaluation metrics (MSE, RMSE, MAE, MAPE, accuracy) and residual diagnostics
//! - Growth and decline scenario columns on every forecast record
//!
//! ## Quick Start
//!
//! ```no_run
//! use revenue_forecast::data::SeriesLoader;
//! use revenue_forecast::models::sarima::SeasonalForecaster;
//! use revenue_forecast::models::sequence::SequenceForecaster;
//! use revenue_forecast::models::Forecaster;
//!
//! # fn main() -> revenue_forecast::Result<()> {
//! // Load monthly revenue
//! let series = SeriesLoader::from_csv("revenue_history.csv")?;
//!
//! // Sequence model: 12-month window, 32 hidden units
//! let mut lstm = SequenceForecaster::new(12, 32)?;
//! lstm.fit(&series)?;
//! let forecast = lstm.forecast(6)?;
//!
//! // Seasonal model: SARIMA(1,1,1)(1,1,1,12)
//! let mut sarima = SeasonalForecaster::default();
//! sarima.fit(&series)?;
//! let with_bounds = sarima.forecast(6)?;
//! println!("{}", sarima.diagnostics()?);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod scaler;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{SeriesLoader, TimeSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::{Diagnostics, EvaluationMetrics};
pub use crate::models::{ForecastRecord, ForecastResult, Forecaster, ModelKind};
pub use crate::scaler::MinMaxScaler;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
