//! Utility functions for the revenue_forecast crate

use crate::data::TimeSeries;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Truncate a date to the first day of its month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a month-start date by `months` calendar months
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        ForecastError::InvalidParameter(format!("Date overflow adding {} months to {}", months, date))
    })
}

/// Signed number of whole calendar months from `from` to `to`
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64)
}

/// Consecutive month starts beginning the month after `last`
pub fn future_month_starts(last: NaiveDate, horizon: usize) -> Result<Vec<NaiveDate>> {
    let base = month_start(last);
    (1..=horizon)
        .map(|step| {
            let step = u32::try_from(step).map_err(|_| {
                ForecastError::InvalidParameter(format!("Horizon too large: {}", horizon))
            })?;
            add_months(base, step)
        })
        .collect()
}

/// Split a series into a training part and a trailing holdout of `test_len` months
pub fn train_test_split(series: &TimeSeries, test_len: usize) -> Result<(TimeSeries, TimeSeries)> {
    if test_len == 0 || test_len >= series.len() {
        return Err(ForecastError::InvalidParameter(format!(
            "Holdout length must be in 1..{}, got {}",
            series.len(),
            test_len
        )));
    }
    let split = series.len() - test_len;
    Ok((series.slice(0, split)?, series.slice(split, series.len())?))
}

/// Split a series by the fraction of observations held out for testing
pub fn train_test_split_ratio(series: &TimeSeries, test_ratio: f64) -> Result<(TimeSeries, TimeSeries)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Test ratio must be between 0 and 1, got {}",
            test_ratio
        )));
    }
    let test_len = ((series.len() as f64 * test_ratio).round() as usize).max(1);
    train_test_split(series, test_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_start() {
        assert_eq!(month_start(ymd(2024, 2, 29)), ymd(2024, 2, 1));
        assert_eq!(month_start(ymd(2024, 3, 1)), ymd(2024, 3, 1));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(ymd(2023, 11, 1), ymd(2024, 2, 1)), 3);
        assert_eq!(months_between(ymd(2024, 2, 1), ymd(2023, 11, 1)), -3);
        assert_eq!(months_between(ymd(2024, 2, 1), ymd(2024, 2, 1)), 0);
    }

    #[test]
    fn test_future_month_starts_cross_year() {
        let dates = future_month_starts(ymd(2023, 11, 15), 3).unwrap();
        assert_eq!(dates, vec![ymd(2023, 12, 1), ymd(2024, 1, 1), ymd(2024, 2, 1)]);
        assert!(future_month_starts(ymd(2023, 11, 1), 0).unwrap().is_empty());
    }
}
