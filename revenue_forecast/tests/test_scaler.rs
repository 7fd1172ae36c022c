use approx::assert_relative_eq;
use revenue_forecast::scaler::MinMaxScaler;
use rstest::rstest;

#[rstest]
#[case(vec![950_000.0, 1_020_000.0, 1_210_000.0, 1_180_500.5])]
#[case(vec![-3.5, 0.0, 12.25])]
#[case(vec![0.001, 0.002, 0.0015])]
fn test_round_trip(#[case] values: Vec<f64>) {
    let scaler = MinMaxScaler::fit(&values).unwrap();
    let restored = scaler.inverse_transform(&scaler.transform(&values));

    for (original, back) in values.iter().zip(&restored) {
        assert_relative_eq!(original, back, max_relative = 1e-6);
    }
}

#[test]
fn test_scaled_values_within_range() {
    let values = [5.0, 25.0, 15.0, 10.0];
    let scaler = MinMaxScaler::fit(&values).unwrap();
    assert!(scaler
        .transform(&values)
        .iter()
        .all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_serde_round_trip() {
    let scaler = MinMaxScaler::fit(&[1.0 / 3.0, 7.0]).unwrap();
    let json = serde_json::to_string(&scaler).unwrap();
    let back: MinMaxScaler = serde_json::from_str(&json).unwrap();
    assert_eq!(scaler, back);
}
