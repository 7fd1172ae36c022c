//! Monthly time series handling for forecasting
//!
//! [`TimeSeries`] is the validated input to every forecaster: one value per
//! calendar month, dated on the first of the month, with no gaps. Raw tables
//! are turned into a `TimeSeries` by [`SeriesLoader`].

use crate::error::{ForecastError, Result};
use crate::utils::{add_months, month_start, months_between};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// A gap-free monthly series indexed by month-start dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SeriesRepr", into = "SeriesRepr")]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// Compact serialized form: the first month and the values that follow it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeriesRepr {
    start: NaiveDate,
    values: Vec<f64>,
}

impl TryFrom<SeriesRepr> for TimeSeries {
    type Error = ForecastError;

    fn try_from(repr: SeriesRepr) -> Result<Self> {
        TimeSeries::monthly(repr.start, repr.values)
    }
}

impl From<TimeSeries> for SeriesRepr {
    fn from(series: TimeSeries) -> Self {
        SeriesRepr {
            start: series.dates[0],
            values: series.values,
        }
    }
}

impl TimeSeries {
    /// Build a series of consecutive months beginning at `start`
    pub fn monthly(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::DataFormatError(
                "Time series must contain at least one observation".to_string(),
            ));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::DataFormatError(format!(
                "Non-finite value at position {}",
                pos
            )));
        }
        if start.day() != 1 {
            return Err(ForecastError::DataFormatError(format!(
                "Series must start on a month start, got {}",
                start
            )));
        }

        let dates = (0..values.len())
            .map(|i| add_months(start, i as u32))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { dates, values })
    }

    /// Build a series from explicit dates, which must be consecutive month starts
    pub fn from_observations(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataFormatError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }
        let start = *dates.first().ok_or_else(|| {
            ForecastError::DataFormatError("Time series must contain at least one observation".to_string())
        })?;

        for (i, pair) in dates.windows(2).enumerate() {
            if months_between(pair[0], pair[1]) != 1 || pair[1].day() != 1 {
                return Err(ForecastError::DataFormatError(format!(
                    "Dates must be consecutive month starts: {} is followed by {} at position {}",
                    pair[0],
                    pair[1],
                    i + 1
                )));
            }
        }

        Self::monthly(start, values)
    }

    /// Month-start dates of the observations
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// First month in the series
    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    /// Last month in the series
    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (date, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Sub-series over `start..end`
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Invalid slice {}..{} of a series with {} observations",
                start,
                end,
                self.len()
            )));
        }
        Ok(Self {
            dates: self.dates[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// The last `count` observations
    pub fn tail(&self, count: usize) -> Result<Self> {
        let count = count.min(self.len());
        self.slice(self.len() - count, self.len())
    }

    /// Position of `date` relative to the first month (negative before the start)
    pub fn offset_of(&self, date: NaiveDate) -> i64 {
        months_between(self.first_date(), date)
    }

    /// Mean of the values
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.len() as f64
    }
}

/// Loader that turns raw (date, value) tables into a [`TimeSeries`]
#[derive(Debug)]
pub struct SeriesLoader;

const DATE_HINTS: [&str; 4] = ["date", "time", "month", "period"];
const VALUE_HINTS: [&str; 4] = ["revenue", "value", "sales", "amount"];

impl SeriesLoader {
    /// Load a monthly series from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
        let file = File::open(path.as_ref())?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        debug!(
            path = %path.as_ref().display(),
            rows = df.height(),
            columns = df.width(),
            "loaded revenue table"
        );
        Self::from_dataframe(&df)
    }

    /// Convert a DataFrame with a date column and a value column
    pub fn from_dataframe(df: &DataFrame) -> Result<TimeSeries> {
        let (date_name, value_name) = Self::select_columns(df)?;
        let dates = Self::parse_date_column(df.column(&date_name)?)?;
        let values = Self::parse_value_column(df.column(&value_name)?)?;

        let observations = dates.into_iter().zip(values).collect::<Vec<_>>();
        Self::from_records(&observations)
    }

    /// Align raw observations to a gap-free month-start series.
    ///
    /// Observations in the same month are averaged, missing months inside the
    /// observed span are linearly interpolated, and leading or trailing months
    /// without a value are dropped.
    pub fn from_records(records: &[(NaiveDate, Option<f64>)]) -> Result<TimeSeries> {
        let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, value) in records {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ForecastError::DataFormatError(format!(
                        "Non-finite value {} on {}",
                        v, date
                    )));
                }
                let entry = buckets.entry(month_start(*date)).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }

        let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(ForecastError::DataFormatError(
                    "Series is empty after monthly alignment".to_string(),
                ))
            }
        };

        let span = months_between(first, last) as usize + 1;
        let mut known: Vec<Option<f64>> = vec![None; span];
        for (date, (sum, count)) in &buckets {
            known[months_between(first, *date) as usize] = Some(sum / *count as f64);
        }

        let missing = known.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            debug!(missing, "interpolating missing months");
        }

        TimeSeries::monthly(first, interpolate_gaps(&known))
    }

    /// Parse a single date string in any of the supported layouts
    pub fn parse_date(raw: &str) -> Result<NaiveDate> {
        let raw = raw.trim();
        const FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

        for format in FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return Ok(date);
            }
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Ok(dt.date());
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.date_naive());
        }
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
            return Ok(date);
        }

        Err(ForecastError::DataFormatError(format!(
            "Unparsable date '{}'",
            raw
        )))
    }

    /// Pick the (date, value) column pair, relabeling wider tables by name
    fn select_columns(df: &DataFrame) -> Result<(String, String)> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();

        if names.len() == 2 {
            return Ok((names[0].clone(), names[1].clone()));
        }
        if names.len() < 2 {
            return Err(ForecastError::DataFormatError(format!(
                "Expected a date column and a value column, found {} column(s)",
                names.len()
            )));
        }

        let find = |hints: &[&str]| -> Vec<&String> {
            names
                .iter()
                .filter(|name| {
                    let lower = name.to_lowercase();
                    hints.iter().any(|hint| lower.contains(hint))
                })
                .collect()
        };
        let date_matches = find(&DATE_HINTS);
        let value_matches = find(&VALUE_HINTS);

        match (date_matches.as_slice(), value_matches.as_slice()) {
            ([date], [value]) if date != value => Ok(((*date).clone(), (*value).clone())),
            _ => Err(ForecastError::DataFormatError(format!(
                "Cannot identify exactly one date and one value column among {:?}",
                names
            ))),
        }
    }

    fn parse_date_column(column: &Series) -> Result<Vec<NaiveDate>> {
        match column.dtype() {
            DataType::Utf8 => column
                .utf8()?
                .into_iter()
                .enumerate()
                .map(|(row, raw)| match raw {
                    Some(raw) => Self::parse_date(raw).map_err(|_| {
                        ForecastError::DataFormatError(format!(
                            "Unparsable date '{}' in row {}",
                            raw, row
                        ))
                    }),
                    None => Err(ForecastError::DataFormatError(format!(
                        "Missing date in row {}",
                        row
                    ))),
                })
                .collect(),
            DataType::Date | DataType::Datetime(_, _) => {
                let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or_else(|| {
                    ForecastError::DataFormatError("Invalid epoch".to_string())
                })?;
                let days = days.i32()?;
                days.into_iter()
                    .enumerate()
                    .map(|(row, day)| {
                        day.and_then(|d| epoch.checked_add_signed(Duration::days(d as i64)))
                            .ok_or_else(|| {
                                ForecastError::DataFormatError(format!(
                                    "Missing or out-of-range date in row {}",
                                    row
                                ))
                            })
                    })
                    .collect()
            }
            other => Err(ForecastError::DataFormatError(format!(
                "Column '{}' of type {:?} cannot be read as dates",
                column.name(),
                other
            ))),
        }
    }

    fn parse_value_column(column: &Series) -> Result<Vec<Option<f64>>> {
        if !column.dtype().is_numeric() && column.dtype() != &DataType::Utf8 {
            return Err(ForecastError::DataFormatError(format!(
                "Column '{}' of type {:?} cannot be read as values",
                column.name(),
                column.dtype()
            )));
        }

        let cast = column.cast(&DataType::Float64)?;
        if cast.null_count() > column.null_count() {
            return Err(ForecastError::DataFormatError(format!(
                "Column '{}' contains non-numeric values",
                column.name()
            )));
        }
        Ok(cast.f64()?.into_iter().collect())
    }
}

/// Fill `None` entries by linear interpolation between known neighbours.
/// The first and last entries must be known.
fn interpolate_gaps(known: &[Option<f64>]) -> Vec<f64> {
    let mut filled = Vec::with_capacity(known.len());
    let mut last_known = 0usize;

    for (i, value) in known.iter().enumerate() {
        match value {
            Some(v) => {
                filled.push(*v);
                last_known = i;
            }
            None => {
                let next = (i + 1..known.len())
                    .find(|&j| known[j].is_some())
                    .unwrap_or(last_known);
                let left = filled[last_known];
                let right = known[next].unwrap_or(left);
                let t = (i - last_known) as f64 / (next - last_known).max(1) as f64;
                filled.push(left + t * (right - left));
            }
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_interpolate_gaps() {
        let filled = interpolate_gaps(&[Some(1.0), None, None, Some(4.0), Some(5.0)]);
        assert_eq!(filled, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_monthly_rejects_mid_month_start() {
        assert!(TimeSeries::monthly(ymd(2023, 1, 15), vec![1.0]).is_err());
        assert!(TimeSeries::monthly(ymd(2023, 1, 1), vec![]).is_err());
        assert!(TimeSeries::monthly(ymd(2023, 1, 1), vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_from_observations_requires_consecutive_months() {
        let ok = TimeSeries::from_observations(
            vec![ymd(2023, 12, 1), ymd(2024, 1, 1)],
            vec![1.0, 2.0],
        );
        assert!(ok.is_ok());

        let gap = TimeSeries::from_observations(
            vec![ymd(2023, 11, 1), ymd(2024, 1, 1)],
            vec![1.0, 2.0],
        );
        assert!(matches!(gap, Err(ForecastError::DataFormatError(_))));
    }

    #[test]
    fn test_serde_uses_compact_form() {
        let series = TimeSeries::monthly(ymd(2022, 11, 1), vec![1.0, 2.5, 3.0]).unwrap();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, r#"{"start":"2022-11-01","values":[1.0,2.5,3.0]}"#);

        let back: TimeSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(back, series);
        assert_eq!(back.last_date(), ymd(2023, 1, 1));
    }

    #[test]
    fn test_parse_date_layouts() {
        assert_eq!(SeriesLoader::parse_date("2023-04-17").unwrap(), ymd(2023, 4, 17));
        assert_eq!(SeriesLoader::parse_date("04/17/2023").unwrap(), ymd(2023, 4, 17));
        assert_eq!(SeriesLoader::parse_date("2023-04").unwrap(), ymd(2023, 4, 1));
        assert_eq!(
            SeriesLoader::parse_date("2023-04-17T10:00:00Z").unwrap(),
            ymd(2023, 4, 17)
        );
        assert!(SeriesLoader::parse_date("next tuesday").is_err());
    }
}
