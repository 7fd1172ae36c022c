//! Seasonal ARIMA estimated by conditional sum of squares
//!
//! The training series is differenced by `(1-B)^d (1-B^s)^D`, the
//! multiplicative ARMA polynomials are fitted with a Nelder-Mead search over
//! the sum of squared one-step errors, and forecasts are produced on the
//! original scale through the expanded autoregressive polynomial.
//!
//! Moving-average coefficients are kept inside (-0.99, 0.99); autoregressive
//! coefficients are unconstrained. A search that runs out of iterations is
//! restarted once from its best point before estimation is declared failed.

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_forecast, Diagnostics, EvaluationMetrics};
use crate::models::{ForecastResult, Forecaster, ModelKind};
use revenue_math::optimization::{nelder_mead, SimplexOptions};
use revenue_math::polynomial;
use revenue_math::statistics::{ljung_box, mean, normal_critical_value, std_dev};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Lags used by the residual whiteness test
pub const LJUNG_BOX_LAGS: usize = 10;

/// Smallest innovation variance kept after fitting
const MIN_SIGMA2: f64 = 1e-12;

/// Moving-average coefficients are searched inside (-MA_BOUND, MA_BOUND)
const MA_BOUND: f64 = 0.99;

/// Starting value of every coefficient
const INITIAL_COEFFICIENT: f64 = 0.1;

/// Non-seasonal order (p, d, q)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    /// Autoregressive order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// Moving-average order
    pub q: usize,
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1 }
    }
}

/// Seasonal order (P, D, Q, s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    /// Seasonal autoregressive order
    pub p: usize,
    /// Seasonal differencing order
    pub d: usize,
    /// Seasonal moving-average order
    pub q: usize,
    /// Season length in months
    pub period: usize,
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self {
            p: 1,
            d: 1,
            q: 1,
            period: 12,
        }
    }
}

/// Model structure and interval level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarimaConfig {
    /// Non-seasonal order
    pub order: SarimaOrder,
    /// Seasonal order
    pub seasonal: SeasonalOrder,
    /// Confidence level of the forecast bounds
    pub confidence_level: f64,
}

impl Default for SarimaConfig {
    fn default() -> Self {
        Self {
            order: SarimaOrder::default(),
            seasonal: SeasonalOrder::default(),
            confidence_level: 0.95,
        }
    }
}

impl SarimaConfig {
    fn validate(&self) -> Result<()> {
        if self.seasonal.period < 2 && (self.seasonal.p + self.seasonal.d + self.seasonal.q) > 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonal terms need a period of at least 2, got {}",
                self.seasonal.period
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    fn differencing(&self) -> Vec<f64> {
        polynomial::differencing_polynomial(self.order.d, self.seasonal.d, self.seasonal.period)
    }
}

impl fmt::Display for SarimaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.order.p,
            self.order.d,
            self.order.q,
            self.seasonal.p,
            self.seasonal.d,
            self.seasonal.q,
            self.seasonal.period
        )
    }
}

/// Estimated coefficients, split by polynomial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaCoefficients {
    /// phi_1..phi_p
    pub ar: Vec<f64>,
    /// theta_1..theta_q
    pub ma: Vec<f64>,
    /// Phi_1..Phi_P
    pub seasonal_ar: Vec<f64>,
    /// Theta_1..Theta_Q
    pub seasonal_ma: Vec<f64>,
}

impl SarimaCoefficients {
    fn from_vector(config: &SarimaConfig, params: &[f64]) -> Self {
        let (ar, rest) = params.split_at(config.order.p);
        let (ma, rest) = rest.split_at(config.order.q);
        let (seasonal_ar, seasonal_ma) = rest.split_at(config.seasonal.p);
        Self {
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: seasonal_ar.to_vec(),
            seasonal_ma: seasonal_ma.to_vec(),
        }
    }

    /// Coefficients at a point of the simplex search.
    ///
    /// Autoregressive terms are taken as is; moving-average terms go through
    /// `MA_BOUND * tanh(u)` so the search stays in the invertible region.
    fn from_search(config: &SarimaConfig, search: &[f64]) -> Self {
        let mut coefficients = Self::from_vector(config, search);
        coefficients
            .ma
            .iter_mut()
            .chain(coefficients.seasonal_ma.iter_mut())
            .for_each(|theta| *theta = MA_BOUND * theta.tanh());
        coefficients
    }

    /// Search point at which every coefficient equals `INITIAL_COEFFICIENT`
    fn initial_search(config: &SarimaConfig) -> Vec<f64> {
        let ma_start = (INITIAL_COEFFICIENT / MA_BOUND).atanh();
        let mut search = vec![INITIAL_COEFFICIENT; config.order.p];
        search.extend(std::iter::repeat(ma_start).take(config.order.q));
        search.extend(std::iter::repeat(INITIAL_COEFFICIENT).take(config.seasonal.p));
        search.extend(std::iter::repeat(ma_start).take(config.seasonal.q));
        search
    }

    /// phi(B) Phi(B^s)
    fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        polynomial::multiply(
            &polynomial::ar_polynomial(&self.ar, 1),
            &polynomial::ar_polynomial(&self.seasonal_ar, period),
        )
    }

    /// theta(B) Theta(B^s)
    fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        polynomial::multiply(
            &polynomial::ma_polynomial(&self.ma, 1),
            &polynomial::ma_polynomial(&self.seasonal_ma, period),
        )
    }

    fn matches(&self, config: &SarimaConfig) -> bool {
        self.ar.len() == config.order.p
            && self.ma.len() == config.order.q
            && self.seasonal_ar.len() == config.seasonal.p
            && self.seasonal_ma.len() == config.seasonal.q
    }
}

/// Everything needed to forecast, evaluate and diagnose without refitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSarima {
    /// Structure the model was fitted with
    pub config: SarimaConfig,
    /// Estimated coefficients
    pub coefficients: SarimaCoefficients,
    /// Mean of the series, estimated only without differencing
    pub mean: Option<f64>,
    /// Innovation variance
    pub sigma2: f64,
    /// Gaussian log-likelihood at the estimate
    pub log_likelihood: f64,
    /// Akaike information criterion
    pub aic: f64,
    /// Bayesian information criterion
    pub bic: f64,
    /// One-step residuals from history index `burn_in` onwards
    pub residuals: Vec<f64>,
    /// First history index with a defined residual
    pub burn_in: usize,
    /// Training series
    pub history: TimeSeries,
}

impl FittedSarima {
    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if !self.coefficients.matches(&self.config) {
            return Err(ForecastError::SerializationError(format!(
                "Stored coefficients do not match {}",
                self.config
            )));
        }
        if self.burn_in + self.residuals.len() != self.history.len() {
            return Err(ForecastError::SerializationError(format!(
                "Stored residuals ({}) and burn-in ({}) do not cover {} months",
                self.residuals.len(),
                self.burn_in,
                self.history.len()
            )));
        }
        if !(self.sigma2.is_finite() && self.sigma2 > 0.0) {
            return Err(ForecastError::SerializationError(format!(
                "Invalid innovation variance {}",
                self.sigma2
            )));
        }
        Ok(())
    }

    /// Residual at history index `t`; zero before the burn-in
    fn residual_at(&self, t: usize) -> f64 {
        t.checked_sub(self.burn_in)
            .and_then(|i| self.residuals.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// One-step-ahead fitted value at history index `t >= burn_in`
    fn fitted_value(&self, t: usize) -> Option<f64> {
        if t < self.burn_in {
            return None;
        }
        self.history
            .values()
            .get(t)
            .map(|y| y - self.residual_at(t))
    }

    /// Dynamic forecasts with their standard errors.
    ///
    /// An explosive autoregressive fit can overflow; that is an error rather
    /// than a non-finite forecast.
    fn project(&self, steps: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let period = self.config.seasonal.period;
        let ar = self.coefficients.ar_polynomial(period);
        let ma = self.coefficients.ma_polynomial(period);
        let full_ar = polynomial::multiply(&ar, &self.config.differencing());
        let mu = self.mean.unwrap_or(0.0);

        let n = self.history.len();
        let mut z: Vec<f64> = self.history.values().iter().map(|y| y - mu).collect();
        let ar_degree = polynomial::degree(&full_ar);
        let ma_degree = polynomial::degree(&ma);

        let mut points = Vec::with_capacity(steps);
        for h in 1..=steps {
            let t = n + h - 1;
            let mut value = 0.0;
            for i in 1..=ar_degree.min(t) {
                value -= full_ar[i] * z[t - i];
            }
            for j in h..=ma_degree {
                if let Some(past) = t.checked_sub(j) {
                    value += ma[j] * self.residual_at(past);
                }
            }
            z.push(value);
            points.push(value + mu);
        }

        let psi = polynomial::psi_weights(&full_ar, &ma, steps);
        let mut cumulative = 0.0;
        let std_errors: Vec<f64> = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        if let Some(h) = points
            .iter()
            .zip(&std_errors)
            .position(|(p, se)| !(p.is_finite() && se.is_finite()))
        {
            return Err(ForecastError::MathError(format!(
                "{} forecast diverged at step {} of {}",
                self.config,
                h + 1,
                steps
            )));
        }
        Ok((points, std_errors))
    }
}

/// Conditional-sum-of-squares residuals of the ARMA filter over `w`.
///
/// Residuals start at `t0 = deg(ar)`; earlier errors are taken as zero.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let t0 = polynomial::degree(ar);
    let ma_degree = polynomial::degree(ma);
    let mut errors = vec![0.0; w.len()];
    for t in t0..w.len() {
        let mut e: f64 = ar
            .iter()
            .take(t0 + 1)
            .enumerate()
            .map(|(i, a)| a * w[t - i])
            .sum();
        for j in 1..=ma_degree.min(t) {
            e -= ma[j] * errors[t - j];
        }
        errors[t] = e;
    }
    errors.split_off(t0)
}

/// Seasonal ARIMA forecaster
#[derive(Debug, Clone)]
pub struct SeasonalForecaster {
    config: SarimaConfig,
    solver: SimplexOptions,
    fitted: Option<FittedSarima>,
}

impl Default for SeasonalForecaster {
    fn default() -> Self {
        Self {
            config: SarimaConfig::default(),
            solver: SimplexOptions::default(),
            fitted: None,
        }
    }
}

impl SeasonalForecaster {
    /// Unfitted forecaster with the given orders and 95% bounds
    pub fn new(order: SarimaOrder, seasonal: SeasonalOrder) -> Result<Self> {
        Self::with_config(SarimaConfig {
            order,
            seasonal,
            ..SarimaConfig::default()
        })
    }

    /// Unfitted forecaster with full settings
    pub fn with_config(config: SarimaConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::default()
        })
    }

    /// Replace the simplex settings used by `fit`
    pub fn with_solver(mut self, solver: SimplexOptions) -> Self {
        self.solver = solver;
        self
    }

    /// Rebuild a fitted forecaster from a persisted model
    pub fn from_fitted(fitted: FittedSarima) -> Result<Self> {
        fitted.validate()?;
        Ok(Self {
            config: fitted.config,
            fitted: Some(fitted),
            ..Self::default()
        })
    }

    /// Model structure
    pub fn config(&self) -> &SarimaConfig {
        &self.config
    }

    fn fitted(&self) -> Result<&FittedSarima> {
        self.fitted.as_ref().ok_or_else(|| {
            ForecastError::NotFittedError("Seasonal model has not been fitted".to_string())
        })
    }

    /// Fitted state for persistence
    pub fn fitted_model(&self) -> Result<&FittedSarima> {
        self.fitted()
    }

    /// Information criteria and residual whiteness of the fit
    pub fn diagnostics(&self) -> Result<Diagnostics> {
        let fitted = self.fitted()?;
        if fitted.residuals.len() <= LJUNG_BOX_LAGS {
            return Err(ForecastError::InsufficientDataError(format!(
                "Ljung-Box over {} lags needs more than {} residuals, got {}",
                LJUNG_BOX_LAGS,
                LJUNG_BOX_LAGS,
                fitted.residuals.len()
            )));
        }
        let test = ljung_box(&fitted.residuals, LJUNG_BOX_LAGS)?;
        Ok(Diagnostics {
            aic: fitted.aic,
            bic: fitted.bic,
            ljung_box_stat: test.statistic,
            ljung_box_pvalue: test.p_value,
            residual_mean: mean(&fitted.residuals)?,
            residual_std: std_dev(&fitted.residuals)?,
        })
    }

    fn estimate(&self, series: &TimeSeries) -> Result<FittedSarima> {
        let config = self.config;
        let differencing = config.differencing();
        let diff_degree = polynomial::degree(&differencing);
        let w = polynomial::apply(&differencing, series.values())?;

        let mu = if diff_degree == 0 {
            Some(mean(&w)?)
        } else {
            None
        };
        let centered: Vec<f64> = w.iter().map(|v| v - mu.unwrap_or(0.0)).collect();

        let period = config.seasonal.period;
        let ar_span = config.order.p + config.seasonal.p * period;
        let k = config.parameter_count();
        if centered.len() <= ar_span + k + 1 {
            return Err(ForecastError::InsufficientDataError(format!(
                "{} needs more than {} months after differencing, got {}",
                config,
                ar_span + k + 1,
                centered.len()
            )));
        }

        let sse = |params: &[f64]| {
            let coefficients = SarimaCoefficients::from_search(&config, params);
            css_residuals(
                &centered,
                &coefficients.ar_polynomial(period),
                &coefficients.ma_polynomial(period),
            )
            .iter()
            .map(|e| e * e)
            .sum::<f64>()
        };

        let params = if k == 0 {
            Vec::new()
        } else {
            let mut result = nelder_mead(&sse, &SarimaCoefficients::initial_search(&config), &self.solver)?;
            debug!(
                iterations = result.iterations,
                sse = result.value,
                converged = result.converged,
                "simplex search finished"
            );
            if !result.converged && result.value.is_finite() {
                warn!(
                    model = %config,
                    iterations = result.iterations,
                    sse = result.value,
                    "simplex budget exhausted, restarting from the best point"
                );
                result = nelder_mead(&sse, &result.point, &self.solver)?;
            }
            if result.point.iter().any(|p| !p.is_finite()) || !result.value.is_finite() {
                return Err(ForecastError::TrainingError(format!(
                    "{} estimation found no finite sum of squares",
                    config
                )));
            }
            if !result.converged {
                return Err(ForecastError::TrainingError(format!(
                    "{} estimation did not converge in {} iterations",
                    config, result.iterations
                )));
            }
            result.point
        };

        let coefficients = SarimaCoefficients::from_search(&config, &params);
        let ar = coefficients.ar_polynomial(period);
        let residuals = css_residuals(&centered, &ar, &coefficients.ma_polynomial(period));
        let n_eff = residuals.len() as f64;
        let sse_value = residuals.iter().map(|e| e * e).sum::<f64>();
        let sigma2 = (sse_value / n_eff).max(MIN_SIGMA2);

        let log_likelihood =
            -0.5 * n_eff * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let estimated = (k + 1 + usize::from(mu.is_some())) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * estimated;
        let bic = -2.0 * log_likelihood + estimated * n_eff.ln();

        Ok(FittedSarima {
            config,
            coefficients,
            mean: mu,
            sigma2,
            log_likelihood,
            aic,
            bic,
            burn_in: diff_degree + polynomial::degree(&ar),
            residuals,
            history: series.clone(),
        })
    }
}

impl Forecaster for SeasonalForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Seasonal
    }

    fn name(&self) -> String {
        self.config.to_string()
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let fitted = self.estimate(series)?;
        info!(
            model = %self.config,
            months = series.len(),
            sigma2 = fitted.sigma2,
            aic = fitted.aic,
            "seasonal model fitted"
        );
        self.fitted = Some(fitted);
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn forecast(&self, steps: usize) -> Result<ForecastResult> {
        let fitted = self.fitted()?;
        if steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be at least one month".to_string(),
            ));
        }

        let z = normal_critical_value(self.config.confidence_level)?;
        let (points, std_errors) = fitted.project(steps)?;
        let intervals: Vec<(f64, f64)> = points
            .iter()
            .zip(&std_errors)
            .map(|(p, se)| (p - z * se, p + z * se))
            .collect();

        ForecastResult::from_points(
            ModelKind::Seasonal,
            fitted.history.last_date(),
            &points,
            Some(&intervals),
        )
    }

    fn evaluate(&self, test: &TimeSeries) -> Result<EvaluationMetrics> {
        let fitted = self.fitted()?;
        let n = fitted.history.len() as i64;
        let offsets: Vec<i64> = test.dates().iter().map(|d| fitted.history.offset_of(*d)).collect();

        let horizon = offsets.iter().map(|&o| o - n + 1).max().unwrap_or(0).max(0) as usize;
        let dynamic = if horizon > 0 {
            fitted.project(horizon)?.0
        } else {
            Vec::new()
        };

        let (actual, predicted): (Vec<f64>, Vec<f64>) = offsets
            .iter()
            .zip(test.values())
            .filter_map(|(&offset, &value)| {
                let prediction = if offset < 0 {
                    None
                } else if offset < n {
                    fitted.fitted_value(offset as usize)
                } else {
                    dynamic.get((offset - n) as usize).copied()
                };
                prediction.map(|p| (value, p))
            })
            .unzip();

        if actual.is_empty() {
            return Err(ForecastError::EvaluationError(format!(
                "Test series {}..{} has no months the fitted model can predict",
                test.first_date(),
                test.last_date()
            )));
        }
        evaluate_forecast(&actual, &predicted)
    }
}
