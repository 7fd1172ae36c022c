//! Fit both forecasters on the revenue history and write their artifacts.
//!
//! The trailing `holdout_months` are held out to measure each model; the
//! persisted models are then refitted on the full history. A model that
//! fails is logged and skipped. Usage:
//! `train_models [config.json]`

use revenue_forecast::data::{SeriesLoader, TimeSeries};
use revenue_forecast::error::ForecastError;
use revenue_forecast::metrics::EvaluationMetrics;
use revenue_forecast::models::sarima::SeasonalForecaster;
use revenue_forecast::models::sequence::SequenceForecaster;
use revenue_forecast::models::{Forecaster, ModelKind};
use revenue_forecast::utils::train_test_split;
use revenue_service::artifacts::{save_seasonal, save_sequence};
use revenue_service::dashboard::{write_metrics_csv, ModelMetricsRow};
use revenue_service::{init_tracing, Result, ServiceConfig, ServiceError};
use std::path::PathBuf;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ServiceConfig::load(config_path.as_deref())?;
    let training = &config.training;

    let series = SeriesLoader::from_csv(config.history_path())?;
    let (train, test) = train_test_split(&series, training.holdout_months)?;
    info!(
        months = series.len(),
        train = train.len(),
        holdout = test.len(),
        "revenue history split"
    );

    let mut rows = Vec::new();
    match train_sequence(&config, &series, &train, test.len()) {
        Ok(metrics) => rows.push(ModelMetricsRow::from_metrics(ModelKind::Sequence, &metrics)),
        Err(e) => error!(error = %e, "sequence model not trained"),
    }
    match train_seasonal(&config, &series, &train, &test) {
        Ok(metrics) => rows.push(ModelMetricsRow::from_metrics(ModelKind::Seasonal, &metrics)),
        Err(e) => error!(error = %e, "seasonal model not trained"),
    }
    if rows.is_empty() {
        return Err(ServiceError::Forecast(ForecastError::TrainingError(
            "No model could be trained".to_string(),
        )));
    }

    std::fs::create_dir_all(&config.data_dir)?;
    write_metrics_csv(config.metrics_path(), &rows)?;
    info!(path = %config.metrics_path().display(), rows = rows.len(), "model metrics written");

    Ok(())
}

/// Holdout-evaluate the sequence model, then refit on `series` and save it
fn train_sequence(
    config: &ServiceConfig,
    series: &TimeSeries,
    train: &TimeSeries,
    holdout: usize,
) -> Result<EvaluationMetrics> {
    let mut sequence = SequenceForecaster::with_config(config.training.sequence.clone())?;
    sequence.fit(train)?;
    // Windows over the holdout need the lookback months that precede it
    let sequence_test = series.tail(holdout + sequence.lookback())?;
    let metrics = sequence.evaluate(&sequence_test)?;
    info!(model = %sequence.name(), rmse = metrics.rmse, accuracy = metrics.accuracy, "sequence holdout");

    sequence.fit(series)?;
    save_sequence(&sequence, config.sequence_model_path(), config.scaler_path())?;
    Ok(metrics)
}

/// Holdout-evaluate the seasonal model, then refit on `series` and save it
fn train_seasonal(
    config: &ServiceConfig,
    series: &TimeSeries,
    train: &TimeSeries,
    test: &TimeSeries,
) -> Result<EvaluationMetrics> {
    let mut seasonal = SeasonalForecaster::with_config(config.training.seasonal)?;
    seasonal.fit(train)?;
    let metrics = seasonal.evaluate(test)?;
    info!(model = %seasonal.name(), rmse = metrics.rmse, accuracy = metrics.accuracy, "seasonal holdout");

    seasonal.fit(series)?;
    match seasonal.diagnostics() {
        Ok(diagnostics) => println!("{}", diagnostics),
        Err(e) => warn!(error = %e, "seasonal diagnostics unavailable"),
    }
    save_seasonal(&seasonal, config.seasonal_model_path())?;
    Ok(metrics)
}
