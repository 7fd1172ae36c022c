//! Forecasting models and their shared output types

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::EvaluationMetrics;
use crate::utils::future_month_starts;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod lstm;
pub mod sarima;
pub mod sequence;

/// Scenario multiplier for the +5% growth projection
pub const GROWTH_5: f64 = 1.05;
/// Scenario multiplier for the +10% growth projection
pub const GROWTH_10: f64 = 1.10;
/// Scenario multiplier for the -5% decline projection
pub const DECLINE_5: f64 = 0.95;

/// The two supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// Recurrent sequence model rolled forward one month at a time
    #[serde(rename = "lstm")]
    Sequence,
    /// Seasonal ARIMA model
    #[serde(rename = "sarima")]
    Seasonal,
}

impl ModelKind {
    /// Every supported kind, in display order
    pub const ALL: [ModelKind; 2] = [ModelKind::Sequence, ModelKind::Seasonal];

    /// Wire tag used in records and requests
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Sequence => "lstm",
            ModelKind::Seasonal => "sarima",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lstm" | "sequence" => Ok(ModelKind::Sequence),
            "sarima" | "seasonal" => Ok(ModelKind::Seasonal),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown model type '{}'. Use lstm or sarima",
                other
            ))),
        }
    }
}

/// One forecast month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Month start being forecast
    pub date: NaiveDate,
    /// Point forecast
    pub forecasted_revenue: f64,
    /// Lower confidence bound, when the model provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    /// Upper confidence bound, when the model provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    /// Point forecast with 5% growth
    pub growth_5: f64,
    /// Point forecast with 10% growth
    pub growth_10: f64,
    /// Point forecast with 5% decline
    pub decline_5: f64,
}

impl ForecastRecord {
    /// Record with scenario columns derived from the point forecast
    pub fn new(date: NaiveDate, forecasted_revenue: f64) -> Self {
        Self {
            date,
            forecasted_revenue,
            lower_bound: None,
            upper_bound: None,
            growth_5: forecasted_revenue * GROWTH_5,
            growth_10: forecasted_revenue * GROWTH_10,
            decline_5: forecasted_revenue * DECLINE_5,
        }
    }

    /// Attach a confidence interval
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }
}

/// Ordered forecast for consecutive months
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Model that produced the forecast
    pub model: ModelKind,
    /// One record per forecast month
    pub records: Vec<ForecastRecord>,
}

impl ForecastResult {
    /// Build records for the months following `last_observed`
    pub fn from_points(
        model: ModelKind,
        last_observed: NaiveDate,
        points: &[f64],
        intervals: Option<&[(f64, f64)]>,
    ) -> Result<Self> {
        if let Some(intervals) = intervals {
            if intervals.len() != points.len() {
                return Err(ForecastError::InvalidParameter(format!(
                    "Values length ({}) doesn't match intervals length ({})",
                    points.len(),
                    intervals.len()
                )));
            }
        }

        let dates = future_month_starts(last_observed, points.len())?;
        let records = dates
            .into_iter()
            .zip(points)
            .enumerate()
            .map(|(i, (date, &value))| {
                let record = ForecastRecord::new(date, value);
                match intervals {
                    Some(bounds) => record.with_bounds(bounds[i].0, bounds[i].1),
                    None => record,
                }
            })
            .collect();

        Ok(Self { model, records })
    }

    /// Number of forecast months
    pub fn horizon(&self) -> usize {
        self.records.len()
    }

    /// Point forecasts in order
    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.forecasted_revenue).collect()
    }

    /// Forecast dates in order
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    /// Serialize the records as a JSON array
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.records)?)
    }
}

/// Common lifecycle of both forecasters: unfit, then `fit`, then read-only use
pub trait Forecaster: fmt::Debug + Send + Sync {
    /// Model family
    fn kind(&self) -> ModelKind;

    /// Human-readable name including the structural parameters
    fn name(&self) -> String;

    /// Fit on a monthly series; on error the forecaster stays in its previous state
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Whether `fit` has succeeded
    fn is_fitted(&self) -> bool;

    /// Forecast the `steps` months after the training series
    fn forecast(&self, steps: usize) -> Result<ForecastResult>;

    /// Accuracy over a held-out series
    fn evaluate(&self, test: &TimeSeries) -> Result<EvaluationMetrics>;
}
