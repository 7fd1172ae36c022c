//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Error and accuracy metrics over a held-out period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Absolute Percentage Error, in percent
    pub mape: f64,
    /// `max(0, 1 - mape / 100)`
    pub accuracy: f64,
}

/// Residual diagnostics of a fitted seasonal model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Akaike information criterion
    pub aic: f64,
    /// Bayesian information criterion
    pub bic: f64,
    /// Ljung-Box Q statistic
    pub ljung_box_stat: f64,
    /// Ljung-Box p-value
    pub ljung_box_pvalue: f64,
    /// Mean of the in-sample residuals
    pub residual_mean: f64,
    /// Population standard deviation of the in-sample residuals
    pub residual_std: f64,
}

/// Compare predictions against actual values.
///
/// MAPE is averaged over the observations with a non-zero actual value.
pub fn evaluate_forecast(actual: &[f64], predicted: &[f64]) -> Result<EvaluationMetrics> {
    if actual.len() != predicted.len() || actual.is_empty() {
        return Err(ForecastError::EvaluationError(format!(
            "Actual ({}) and predicted ({}) values must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.iter().chain(predicted).any(|v| !v.is_finite()) {
        return Err(ForecastError::EvaluationError(
            "Cannot evaluate non-finite values".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

    let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
    let rmse = mse.sqrt();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

    let percentage: Vec<f64> = actual
        .iter()
        .zip(&errors)
        .filter(|(&a, _)| a != 0.0)
        .map(|(a, e)| (e / a).abs() * 100.0)
        .collect();
    if percentage.is_empty() {
        return Err(ForecastError::EvaluationError(
            "MAPE is undefined when every actual value is zero".to_string(),
        ));
    }
    let mape = percentage.iter().sum::<f64>() / percentage.len() as f64;

    Ok(EvaluationMetrics {
        mse,
        rmse,
        mae,
        mape,
        accuracy: accuracy_from_mape(mape),
    })
}

/// Accuracy score derived from MAPE, clamped at zero
pub fn accuracy_from_mape(mape: f64) -> f64 {
    (1.0 - mape / 100.0).max(0.0)
}

impl std::fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Performance Metrics:")?;
        writeln!(f, "  MSE:      {:.4}", self.mse)?;
        writeln!(f, "  RMSE:     {:.4}", self.rmse)?;
        writeln!(f, "  MAE:      {:.4}", self.mae)?;
        writeln!(f, "  MAPE:     {:.4}%", self.mape)?;
        writeln!(f, "  Accuracy: {:.2}%", self.accuracy * 100.0)?;
        Ok(())
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Residual Diagnostics:")?;
        writeln!(f, "  AIC:           {:.4}", self.aic)?;
        writeln!(f, "  BIC:           {:.4}", self.bic)?;
        writeln!(f, "  Ljung-Box Q:   {:.4}", self.ljung_box_stat)?;
        writeln!(f, "  Ljung-Box p:   {:.4}", self.ljung_box_pvalue)?;
        writeln!(f, "  Residual mean: {:.4}", self.residual_mean)?;
        writeln!(f, "  Residual std:  {:.4}", self.residual_std)?;
        Ok(())
    }
}
