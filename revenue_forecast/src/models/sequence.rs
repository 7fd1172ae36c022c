//! Sequence forecaster: an LSTM over a lookback window rolled forward one
//! month at a time

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{evaluate_forecast, EvaluationMetrics};
use crate::models::lstm::{self, LstmNetwork, TrainingHistory, TrainingOptions};
use crate::models::{ForecastResult, Forecaster, ModelKind};
use crate::scaler::MinMaxScaler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of past months fed to the network
pub const DEFAULT_LOOKBACK: usize = 12;

/// Structural and training settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Months per input window
    pub lookback: usize,
    /// LSTM hidden units
    pub hidden_units: usize,
    /// Seed for weight initialization and shuffling
    pub seed: u64,
    /// Optimizer settings
    pub training: TrainingOptions,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            hidden_units: 32,
            seed: 42,
            training: TrainingOptions::default(),
        }
    }
}

impl SequenceConfig {
    fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lookback window must be at least one month".to_string(),
            ));
        }
        if self.hidden_units == 0 {
            return Err(ForecastError::InvalidParameter(
                "LSTM needs at least one hidden unit".to_string(),
            ));
        }
        self.training.validate()
    }
}

/// Fixed-length window of the most recent scaled values.
///
/// Shifting never mutates: it returns a new window with the oldest value
/// dropped and the new one appended.
#[derive(Debug, Clone, PartialEq)]
pub struct LookbackWindow {
    values: Arc<[f64]>,
}

impl LookbackWindow {
    /// Window over `values`, oldest first
    pub fn new(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Lookback window cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            values: Arc::from(values),
        })
    }

    /// Window with `next` appended and the oldest value dropped
    pub fn shifted(&self, next: f64) -> Self {
        let values: Vec<f64> = self.values[1..]
            .iter()
            .copied()
            .chain(std::iter::once(next))
            .collect();
        Self {
            values: values.into(),
        }
    }

    /// Values, oldest first
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Window length
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; windows are never empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Persistable fitted state apart from the scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceModelState {
    /// Months per input window
    pub lookback: usize,
    /// Trained weights
    pub network: LstmNetwork,
    /// Unscaled training series
    pub history: TimeSeries,
    /// Per-epoch losses of the training run
    pub training: TrainingHistory,
}

#[derive(Debug, Clone)]
struct FittedSequence {
    network: LstmNetwork,
    scaler: MinMaxScaler,
    history: TimeSeries,
    training: TrainingHistory,
}

/// LSTM forecaster for monthly revenue
#[derive(Debug, Clone)]
pub struct SequenceForecaster {
    config: SequenceConfig,
    fitted: Option<FittedSequence>,
}

impl SequenceForecaster {
    /// Unfitted forecaster with the given window length and hidden size
    pub fn new(lookback: usize, hidden_units: usize) -> Result<Self> {
        Self::with_config(SequenceConfig {
            lookback,
            hidden_units,
            ..SequenceConfig::default()
        })
    }

    /// Unfitted forecaster with full settings
    pub fn with_config(config: SequenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fitted: None,
        })
    }

    /// Rebuild a fitted forecaster from persisted parts
    pub fn from_parts(state: SequenceModelState, scaler: MinMaxScaler) -> Result<Self> {
        state.network.validate()?;
        if state.lookback == 0 || state.history.len() < state.lookback {
            return Err(ForecastError::SerializationError(format!(
                "Stored history has {} months but the lookback window needs {}",
                state.history.len(),
                state.lookback
            )));
        }

        let config = SequenceConfig {
            lookback: state.lookback,
            hidden_units: state.network.hidden_units(),
            ..SequenceConfig::default()
        };
        Ok(Self {
            config,
            fitted: Some(FittedSequence {
                network: state.network,
                scaler,
                history: state.history,
                training: state.training,
            }),
        })
    }

    /// Current settings
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Months per input window
    pub fn lookback(&self) -> usize {
        self.config.lookback
    }

    /// Fit overriding the validation fraction, epoch budget and batch size
    pub fn fit_with(
        &mut self,
        series: &TimeSeries,
        validation_split: f64,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()> {
        let options = TrainingOptions {
            validation_split,
            epochs,
            batch_size,
            ..self.config.training.clone()
        };
        self.train(series, &options)
    }

    fn train(&mut self, series: &TimeSeries, options: &TrainingOptions) -> Result<()> {
        let lookback = self.config.lookback;
        if series.len() <= lookback {
            return Err(ForecastError::InsufficientDataError(format!(
                "Need more than {} months to train with a {}-month window, got {}",
                lookback,
                lookback,
                series.len()
            )));
        }

        let scaler = MinMaxScaler::fit(series.values())?;
        let scaled = scaler.transform(series.values());
        let samples = lstm::sliding_windows(&scaled, lookback);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let network = LstmNetwork::new(self.config.hidden_units, &mut rng)?;
        let (network, training) = lstm::train(network, &samples, options, &mut rng)?;

        info!(
            months = series.len(),
            windows = samples.len(),
            epochs = training.epochs_run(),
            "sequence model fitted"
        );

        self.fitted = Some(FittedSequence {
            network,
            scaler,
            history: series.clone(),
            training,
        });
        Ok(())
    }

    fn fitted(&self) -> Result<&FittedSequence> {
        self.fitted.as_ref().ok_or_else(|| {
            ForecastError::NotFittedError("Sequence model has not been fitted".to_string())
        })
    }

    /// Training run record
    pub fn training_history(&self) -> Result<&TrainingHistory> {
        Ok(&self.fitted()?.training)
    }

    /// Series the model was trained on
    pub fn history(&self) -> Result<&TimeSeries> {
        Ok(&self.fitted()?.history)
    }

    /// Scaler fitted on the training series
    pub fn scaler(&self) -> Result<MinMaxScaler> {
        Ok(self.fitted()?.scaler)
    }

    /// Fitted state for persistence; the scaler is stored separately
    pub fn model_state(&self) -> Result<SequenceModelState> {
        let fitted = self.fitted()?;
        Ok(SequenceModelState {
            lookback: self.config.lookback,
            network: fitted.network.clone(),
            history: fitted.history.clone(),
            training: fitted.training.clone(),
        })
    }
}

impl Forecaster for SequenceForecaster {
    fn kind(&self) -> ModelKind {
        ModelKind::Sequence
    }

    fn name(&self) -> String {
        format!(
            "LSTM(lookback={}, hidden={})",
            self.config.lookback, self.config.hidden_units
        )
    }

    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let options = self.config.training.clone();
        self.train(series, &options)
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

        let history = fitted.history.values();
        let seed = fitted
            .scaler
            .transform(&history[history.len() - self.config.lookback..]);
        let mut window = LookbackWindow::new(&seed)?;

        let mut scaled = Vec::with_capacity(steps);
        for _ in 0..steps {
            let next = fitted.network.predict(window.values());
            scaled.push(next);
            window = window.shifted(next);
        }
        let points = fitted.scaler.inverse_transform(&scaled);
        debug!(steps, "sequence rollout complete");

        ForecastResult::from_points(ModelKind::Sequence, fitted.history.last_date(), &points, None)
    }

    fn evaluate(&self, test: &TimeSeries) -> Result<EvaluationMetrics> {
        let fitted = self.fitted()?;
        let lookback = self.config.lookback;
        if test.len() <= lookback {
            return Err(ForecastError::InsufficientDataError(format!(
                "Need more than {} test months to evaluate a {}-month window, got {}",
                lookback,
                lookback,
                test.len()
            )));
        }

        let scaled = fitted.scaler.transform(test.values());
        let predicted: Vec<f64> = lstm::sliding_windows(&scaled, lookback)
            .iter()
            .map(|sample| fitted.network.predict(&sample.window))
            .collect();
        let predicted = fitted.scaler.inverse_transform(&predicted);

        evaluate_forecast(&test.values()[lookback..], &predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::monthly(NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), values).unwrap()
    }

    fn quick_config() -> SequenceConfig {
        SequenceConfig {
            lookback: 3,
            hidden_units: 4,
            training: TrainingOptions {
                epochs: 5,
                batch_size: 4,
                ..TrainingOptions::default()
            },
            ..SequenceConfig::default()
        }
    }

    #[test]
    fn test_window_shift_is_persistent() {
        let window = LookbackWindow::new(&[1.0, 2.0, 3.0]).unwrap();
        let next = window.shifted(4.0);
        assert_eq!(window.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(next.values(), &[2.0, 3.0, 4.0]);
        assert_eq!(next.len(), 3);
        assert!(LookbackWindow::new(&[]).is_err());
    }

    #[test]
    fn test_rejects_invalid_config() {
        assert!(SequenceForecaster::new(0, 8).is_err());
        assert!(SequenceForecaster::new(12, 0).is_err());
    }

    #[test]
    fn test_model_state_requires_fit() {
        let model = SequenceForecaster::with_config(quick_config()).unwrap();
        assert!(matches!(
            model.model_state(),
            Err(ForecastError::NotFittedError(_))
        ));
    }

    #[test]
    fn test_parts_round_trip() {
        let mut model = SequenceForecaster::with_config(quick_config()).unwrap();
        let values: Vec<f64> = (0..12).map(|i| 100.0 + (i % 4) as f64 * 10.0).collect();
        model.fit(&series(values)).unwrap();

        let rebuilt =
            SequenceForecaster::from_parts(model.model_state().unwrap(), model.scaler().unwrap())
                .unwrap();
        assert_eq!(
            model.forecast(4).unwrap(),
            rebuilt.forecast(4).unwrap()
        );
    }
}
