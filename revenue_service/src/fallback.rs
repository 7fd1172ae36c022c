//! Synthetic forecasts used when a real model cannot answer
//!
//! The generator follows a linear trend, a yearly sinusoid and clamped
//! Gaussian noise around a base revenue level. Output is deterministic for a
//! given seed and has the same shape as a model forecast.

use crate::error::{Result, ServiceError};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use revenue_forecast::models::{ForecastResult, ModelKind};
use revenue_forecast::TimeSeries;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Why a forecast came from the synthetic generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The model or one of its dependencies was not loaded
    Unavailable {
        /// What was missing
        missing: String,
    },
    /// The model was loaded but returned an error
    ModelFailed {
        /// The model's error message
        error: String,
    },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Unavailable { missing } => write!(f, "unavailable: {}", missing),
            FallbackReason::ModelFailed { error } => write!(f, "model failed: {}", error),
        }
    }
}

/// Provenance of a forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForecastSource {
    /// Produced by the fitted model
    Model,
    /// Produced by the synthetic generator
    Synthetic {
        /// Why the model was bypassed
        reason: FallbackReason,
    },
}

impl ForecastSource {
    /// True for synthetic output
    pub fn is_synthetic(&self) -> bool {
        matches!(self, ForecastSource::Synthetic { .. })
    }
}

/// Shape of a synthetic series, as fractions of the base level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProfile {
    /// Growth per month
    pub trend: f64,
    /// Amplitude of the yearly sinusoid
    pub seasonal: f64,
    /// Standard deviation of the noise
    pub noise_sd: f64,
}

impl SyntheticProfile {
    /// Profile mimicking each model family
    pub fn for_kind(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Sequence => Self {
                trend: 0.02,
                seasonal: 0.08,
                noise_sd: 0.015,
            },
            ModelKind::Seasonal => Self {
                trend: 0.015,
                seasonal: 0.10,
                noise_sd: 0.02,
            },
        }
    }

    /// Profile of the built-in history series
    pub fn history() -> Self {
        Self {
            trend: 0.01,
            seasonal: 0.10,
            noise_sd: 0.05,
        }
    }
}

/// Base level of the built-in history series
pub const HISTORY_BASE_REVENUE: f64 = 950_000.0;
/// Months in the built-in history series (2020-01 to 2023-12)
pub const HISTORY_MONTHS: usize = 48;

/// Seeded generator of synthetic revenue
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    base_revenue: f64,
    seed: u64,
}

impl SyntheticGenerator {
    /// Generator around `base_revenue` with noise seeded by `seed`
    pub fn new(base_revenue: f64, seed: u64) -> Self {
        Self { base_revenue, seed }
    }

    /// `count` values of `base * (1 + trend*i + seasonal*sin(i*pi/6) + noise)`
    pub fn values(&self, base: f64, profile: SyntheticProfile, count: usize) -> Result<Vec<f64>> {
        let noise = Normal::new(0.0, profile.noise_sd).map_err(|e| {
            ServiceError::Config(format!("Invalid noise level {}: {}", profile.noise_sd, e))
        })?;
        let bound = 3.0 * profile.noise_sd;
        let mut rng = StdRng::seed_from_u64(self.seed);

        Ok((0..count)
            .map(|i| {
                let i = i as f64;
                let trend = profile.trend * i;
                let seasonal = (i * PI / 6.0).sin() * profile.seasonal;
                let shock = noise.sample(&mut rng).clamp(-bound, bound);
                base * (1.0 + trend + seasonal + shock)
            })
            .collect())
    }

    /// Synthetic forecast for the `periods` months after `last_month`
    pub fn forecast(
        &self,
        kind: ModelKind,
        last_month: NaiveDate,
        periods: usize,
    ) -> Result<ForecastResult> {
        let points = self.values(self.base_revenue, SyntheticProfile::for_kind(kind), periods)?;
        Ok(ForecastResult::from_points(kind, last_month, &points, None)?)
    }

    /// Built-in monthly history from 2020-01 to 2023-12
    pub fn history(&self) -> Result<TimeSeries> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .ok_or_else(|| ServiceError::Config("Invalid history start".to_string()))?;
        let values = self.values(HISTORY_BASE_REVENUE, SyntheticProfile::history(), HISTORY_MONTHS)?;
        Ok(TimeSeries::monthly(start, values)?)
    }
}
