use approx::assert_abs_diff_eq;
use revenue_forecast::error::ForecastError;
use revenue_forecast::metrics::evaluate_forecast;
use rstest::rstest;

#[test]
fn test_evaluate_forecast() {
    let actual = [100.0, 200.0, 400.0];
    let predicted = [110.0, 190.0, 400.0];

    let metrics = evaluate_forecast(&actual, &predicted).unwrap();

    assert_abs_diff_eq!(metrics.mse, 200.0 / 3.0, epsilon = 1e-9);
    assert_abs_diff_eq!(metrics.rmse, (200.0f64 / 3.0).sqrt(), epsilon = 1e-9);
    assert_abs_diff_eq!(metrics.mae, 20.0 / 3.0, epsilon = 1e-9);
    assert_abs_diff_eq!(metrics.mape, 5.0, epsilon = 1e-9);
    assert_abs_diff_eq!(metrics.accuracy, 0.95, epsilon = 1e-12);
}

#[rstest]
#[case(&[1.0, 2.0], &[1.0])]
#[case(&[], &[])]
#[case(&[1.0, f64::NAN], &[1.0, 2.0])]
fn test_evaluate_rejects_bad_input(#[case] actual: &[f64], #[case] predicted: &[f64]) {
    assert!(matches!(
        evaluate_forecast(actual, predicted),
        Err(ForecastError::EvaluationError(_))
    ));
}

#[test]
fn test_accuracy_never_negative() {
    let metrics = evaluate_forecast(&[10.0, 10.0], &[100.0, -80.0]).unwrap();
    assert!(metrics.mape > 100.0);
    assert_eq!(metrics.accuracy, 0.0);
}

#[test]
fn test_metrics_display() {
    let metrics = evaluate_forecast(&[100.0], &[90.0]).unwrap();
    let text = metrics.to_string();
    assert!(text.contains("RMSE"));
    assert!(text.contains("90.00%"));
}
