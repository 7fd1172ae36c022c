use chrono::NaiveDate;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use revenue_forecast::data::{SeriesLoader, TimeSeries};
use revenue_forecast::error::ForecastError;
use revenue_forecast::utils::{future_month_starts, train_test_split};
use std::io::Write;
use tempfile::NamedTempFile;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_loader_from_csv() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,revenue").unwrap();
    writeln!(file, "2023-01-01,1000.0").unwrap();
    writeln!(file, "2023-02-01,1100.0").unwrap();
    writeln!(file, "2023-03-01,1050.0").unwrap();

    let series = SeriesLoader::from_csv(file.path()).unwrap();

    assert_eq!(series.len(), 3);
    assert_eq!(series.first_date(), ymd(2023, 1, 1));
    assert_eq!(series.values(), &[1000.0, 1100.0, 1050.0]);
}

#[test]
fn test_loader_averages_months_and_fills_gaps() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,revenue").unwrap();
    writeln!(file, "2023-01-15,100").unwrap();
    writeln!(file, "2023-01-20,200").unwrap();
    writeln!(file, "2023-03-01,250").unwrap();

    let series = SeriesLoader::from_csv(file.path()).unwrap();

    assert_eq!(
        series.dates(),
        &[ymd(2023, 1, 1), ymd(2023, 2, 1), ymd(2023, 3, 1)]
    );
    assert_eq!(series.values(), &[150.0, 200.0, 250.0]);
}

#[test]
fn test_loader_picks_named_columns_in_wide_tables() {
    let df = df!(
        "region" => &["north", "north"],
        "Month" => &["2024-01", "2024-02"],
        "Revenue" => &[10.0, 12.0]
    )
    .unwrap();

    let series = SeriesLoader::from_dataframe(&df).unwrap();
    assert_eq!(series.first_date(), ymd(2024, 1, 1));
    assert_eq!(series.values(), &[10.0, 12.0]);
}

#[test]
fn test_loader_error_handling() {
    assert!(matches!(
        SeriesLoader::from_csv("nonexistent_file.csv"),
        Err(ForecastError::IoError(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,revenue").unwrap();
    writeln!(file, "not a date,100").unwrap();
    assert!(matches!(
        SeriesLoader::from_csv(file.path()),
        Err(ForecastError::DataFormatError(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,revenue").unwrap();
    writeln!(file, "2023-01-01,lots").unwrap();
    assert!(matches!(
        SeriesLoader::from_csv(file.path()),
        Err(ForecastError::DataFormatError(_))
    ));
}

#[test]
fn test_series_operations() {
    let series = TimeSeries::monthly(ymd(2023, 1, 1), vec![100.0, 103.0, 106.0]).unwrap();

    let subset = series.slice(1, 3).unwrap();
    assert_eq!(subset.len(), 2);
    assert_eq!(subset.first_date(), ymd(2023, 2, 1));
    assert_eq!(series.mean(), 103.0);
    assert_eq!(series.offset_of(ymd(2023, 5, 1)), 4);
    assert!(series.slice(2, 2).is_err());
}

#[test]
fn test_train_test_split() {
    let series = TimeSeries::monthly(ymd(2020, 1, 1), (0..36).map(f64::from).collect()).unwrap();
    let (train, test) = train_test_split(&series, 12).unwrap();

    assert_eq!(train.len(), 24);
    assert_eq!(test.len(), 12);
    assert_eq!(test.first_date(), ymd(2022, 1, 1));
    assert!(train_test_split(&series, 36).is_err());
}

#[test]
fn test_future_month_starts_cross_year() {
    let dates = future_month_starts(ymd(2023, 11, 1), 3).unwrap();
    assert_eq!(dates, vec![ymd(2023, 12, 1), ymd(2024, 1, 1), ymd(2024, 2, 1)]);
}
