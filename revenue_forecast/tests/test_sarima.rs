use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use revenue_forecast::data::TimeSeries;
use revenue_forecast::error::ForecastError;
use revenue_forecast::models::sarima::{
    FittedSarima, SarimaConfig, SarimaOrder, SeasonalForecaster, SeasonalOrder,
};
use revenue_forecast::models::{Forecaster, ModelKind, GROWTH_5};
use revenue_forecast::utils::train_test_split;
use revenue_math::optimization::SimplexOptions;
use rstest::rstest;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Five years of trend, yearly seasonality and an irregular component
fn revenue_series() -> TimeSeries {
    let values = (0..60)
        .map(|i| {
            let t = i as f64;
            let seasonal = 80_000.0 * (t * std::f64::consts::PI / 6.0).sin();
            let irregular = 9_000.0 * (t * 1.7).sin() + 6_000.0 * (t * 0.45).cos();
            1_000_000.0 + 5_000.0 * t + seasonal + irregular
        })
        .collect();
    TimeSeries::monthly(ymd(2019, 1, 1), values).unwrap()
}

fn fitted_model() -> SeasonalForecaster {
    let mut model = SeasonalForecaster::default();
    model.fit(&revenue_series()).unwrap();
    model
}

#[test]
fn test_forecast_bounds_widen_with_horizon() {
    let model = fitted_model();
    let forecast = model.forecast(12).unwrap();

    assert_eq!(forecast.model, ModelKind::Seasonal);
    assert_eq!(forecast.horizon(), 12);
    assert_eq!(forecast.records[0].date, ymd(2024, 1, 1));

    let mut previous_width = 0.0;
    for record in &forecast.records {
        let lower = record.lower_bound.unwrap();
        let upper = record.upper_bound.unwrap();
        assert!(lower <= record.forecasted_revenue && record.forecasted_revenue <= upper);

        let width = upper - lower;
        assert!(width >= previous_width);
        previous_width = width;

        assert_eq!(record.growth_5, record.forecasted_revenue * GROWTH_5);
    }
}

#[test]
fn test_forecast_is_idempotent() {
    let model = fitted_model();
    assert_eq!(model.forecast(6).unwrap(), model.forecast(6).unwrap());
}

#[test]
fn test_diagnostics() {
    let diagnostics = fitted_model().diagnostics().unwrap();

    assert!((0.0..=1.0).contains(&diagnostics.ljung_box_pvalue));
    assert!(diagnostics.ljung_box_stat >= 0.0);
    assert!(diagnostics.residual_std >= 0.0);
    assert!(diagnostics.aic.is_finite() && diagnostics.bic.is_finite());
    // BIC penalizes the five estimated parameters more than AIC with 34 residuals
    assert!(diagnostics.bic > diagnostics.aic);
}

#[test]
fn test_evaluate_out_of_sample_and_in_sample() {
    let series = revenue_series();
    let (train, test) = train_test_split(&series, 12).unwrap();
    let mut model = SeasonalForecaster::default();
    model.fit(&train).unwrap();

    let holdout = model.evaluate(&test).unwrap();
    assert!(holdout.rmse > 0.0);
    assert!((0.0..=1.0).contains(&holdout.accuracy));

    // Months inside the training span use one-step fitted values
    let in_sample = model.evaluate(&train.tail(12).unwrap()).unwrap();
    assert!(in_sample.mae >= 0.0);
}

#[test]
fn test_evaluate_outside_estimable_range() {
    let model = fitted_model();
    let early = revenue_series().slice(0, 6).unwrap();

    assert!(matches!(
        model.evaluate(&early),
        Err(ForecastError::EvaluationError(_))
    ));
}

#[test]
fn test_unfitted_model_errors() {
    let model = SeasonalForecaster::default();

    assert!(matches!(model.forecast(3), Err(ForecastError::NotFittedError(_))));
    assert!(matches!(model.diagnostics(), Err(ForecastError::NotFittedError(_))));
    assert!(matches!(
        model.evaluate(&revenue_series()),
        Err(ForecastError::NotFittedError(_))
    ));
}

#[test]
fn test_no_differencing_estimates_mean() {
    let config = SarimaConfig {
        order: SarimaOrder { p: 1, d: 0, q: 0 },
        seasonal: SeasonalOrder {
            p: 0,
            d: 0,
            q: 0,
            period: 12,
        },
        ..SarimaConfig::default()
    };
    let mut model = SeasonalForecaster::with_config(config).unwrap();
    model.fit(&revenue_series()).unwrap();

    let fitted = model.fitted_model().unwrap();
    assert!(fitted.mean.is_some());
    assert_eq!(fitted.coefficients.ar.len(), 1);
    assert_eq!(model.name(), "SARIMA(1,0,0)(0,0,0,12)");
}

#[test]
fn test_persisted_model_forecasts_identically() {
    let model = fitted_model();
    let json = serde_json::to_string(model.fitted_model().unwrap()).unwrap();

    let stored: FittedSarima = serde_json::from_str(&json).unwrap();
    let restored = SeasonalForecaster::from_fitted(stored).unwrap();

    let original = model.forecast(12).unwrap();
    let reloaded = restored.forecast(12).unwrap();
    for (a, b) in original.records.iter().zip(&reloaded.records) {
        assert_abs_diff_eq!(a.forecasted_revenue, b.forecasted_revenue, epsilon = 1e-6);
        assert_abs_diff_eq!(a.upper_bound.unwrap(), b.upper_bound.unwrap(), epsilon = 1e-6);
    }
}

#[test]
fn test_rejects_invalid_confidence_level() {
    let config = SarimaConfig {
        confidence_level: 1.5,
        ..SarimaConfig::default()
    };
    assert!(matches!(
        SeasonalForecaster::with_config(config),
        Err(ForecastError::InvalidParameter(_))
    ));
}

/// Trend and yearly seasonality with seeded uniform noise of +/- 30k
fn noisy_revenue(months: usize, seed: u64) -> TimeSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..months)
        .map(|i| {
            let t = i as f64;
            let seasonal = 70_000.0 * (t * std::f64::consts::PI / 6.0).sin();
            1_000_000.0 + 4_000.0 * t + seasonal + rng.gen_range(-30_000.0..30_000.0)
        })
        .collect();
    TimeSeries::monthly(ymd(2018, 1, 1), values).unwrap()
}

#[rstest]
#[case(36)]
#[case(48)]
#[case(60)]
fn test_default_model_fits_noisy_series(#[case] months: usize) {
    for seed in 0..8 {
        let mut model = SeasonalForecaster::default();
        model.fit(&noisy_revenue(months, seed)).unwrap();

        let fitted = model.fitted_model().unwrap();
        for theta in fitted.coefficients.ma.iter().chain(&fitted.coefficients.seasonal_ma) {
            assert!(theta.abs() < 1.0, "months={} seed={} theta={}", months, seed, theta);
        }

        let forecast = model.forecast(12).unwrap();
        assert!(forecast
            .records
            .iter()
            .all(|r| r.forecasted_revenue.is_finite()));
    }
}

#[test]
fn test_exhausted_search_leaves_model_unfitted() {
    let mut model = SeasonalForecaster::default().with_solver(SimplexOptions {
        max_iterations: 1,
        ..SimplexOptions::default()
    });

    assert!(matches!(
        model.fit(&revenue_series()),
        Err(ForecastError::TrainingError(_))
    ));
    assert!(!model.is_fitted());
    assert!(matches!(model.forecast(3), Err(ForecastError::NotFittedError(_))));
}

#[test]
fn test_overflowing_sum_of_squares_is_an_error() {
    // Differences near 1e201 square past f64::MAX
    let values = (0..40)
        .map(|i| 1e200 * (1.0 + ((i * 7) % 11) as f64))
        .collect();
    let series = TimeSeries::monthly(ymd(2019, 1, 1), values).unwrap();

    let mut model = SeasonalForecaster::default();
    assert!(matches!(
        model.fit(&series),
        Err(ForecastError::TrainingError(_))
    ));
    assert!(!model.is_fitted());
}

#[test]
fn test_explosive_coefficients_fail_to_forecast() {
    let mut fitted = fitted_model().fitted_model().unwrap().clone();
    fitted.coefficients.ar = vec![1e3];
    let model = SeasonalForecaster::from_fitted(fitted).unwrap();

    assert!(matches!(model.forecast(120), Err(ForecastError::MathError(_))));
}

#[test]
fn test_diagnostics_need_more_residuals_than_lags() {
    // 34 months leave 8 residuals after differencing and the AR burn-in
    let short = TimeSeries::monthly(ymd(2019, 1, 1), revenue_series().values()[..34].to_vec())
        .unwrap();
    let mut model = SeasonalForecaster::default();
    model.fit(&short).unwrap();

    assert_eq!(model.fitted_model().unwrap().residuals.len(), 8);
    assert!(matches!(
        model.diagnostics(),
        Err(ForecastError::InsufficientDataError(_))
    ));
    assert_eq!(model.forecast(3).unwrap().horizon(), 3);
}
