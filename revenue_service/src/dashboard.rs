//! Metric, history and scenario tables served to the dashboard

use crate::error::Result;
use chrono::NaiveDate;
use revenue_forecast::metrics::EvaluationMetrics;
use revenue_forecast::models::ModelKind;
use revenue_forecast::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Where a dashboard table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Read from a file in the data directory
    File,
    /// Built into the service
    BuiltIn,
}

/// A dashboard table tagged with its origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    /// Origin of `data`
    pub source: DataSource,
    /// The table
    pub data: T,
}

impl<T> Sourced<T> {
    /// Data read from a file
    pub fn file(data: T) -> Self {
        Self {
            source: DataSource::File,
            data,
        }
    }

    /// Built-in data
    pub fn built_in(data: T) -> Self {
        Self {
            source: DataSource::BuiltIn,
            data,
        }
    }
}

/// Holdout metrics of one model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetricsRow {
    /// Model wire tag
    pub model_type: ModelKind,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// MAPE-derived accuracy
    pub accuracy: f64,
}

impl ModelMetricsRow {
    /// Row for `model_type` from evaluation metrics
    pub fn from_metrics(model_type: ModelKind, metrics: &EvaluationMetrics) -> Self {
        Self {
            model_type,
            rmse: metrics.rmse,
            mae: metrics.mae,
            mse: metrics.mse,
            accuracy: metrics.accuracy,
        }
    }
}

/// One month of history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPoint {
    /// Month start
    pub date: NaiveDate,
    /// Observed revenue
    pub revenue: f64,
}

/// Convert a series to dashboard points
pub fn history_points(series: &TimeSeries) -> Vec<HistoricalPoint> {
    series
        .iter()
        .map(|(date, revenue)| HistoricalPoint { date, revenue })
        .collect()
}

/// A what-if growth scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario identifier
    pub scenario: String,
    /// Growth applied to the base forecast
    pub growth_rate: f64,
    /// Human-readable label
    pub description: String,
}

/// Reference metrics shown before any training run has written its own
pub fn reference_metrics() -> Vec<ModelMetricsRow> {
    vec![
        ModelMetricsRow {
            model_type: ModelKind::Sequence,
            rmse: 111.6,
            mae: 8.2,
            mse: 12_450.0,
            accuracy: 0.874,
        },
        ModelMetricsRow {
            model_type: ModelKind::Seasonal,
            rmse: 114.9,
            mae: 9.1,
            mse: 13_200.0,
            accuracy: 0.852,
        },
    ]
}

/// The base, +5%, +10% and -5% scenarios
pub fn default_scenarios() -> Vec<Scenario> {
    [
        ("base", 0.0, "Current trajectory"),
        ("optimistic_5", 0.05, "5% growth scenario"),
        ("optimistic_10", 0.10, "10% growth scenario"),
        ("pessimistic", -0.05, "5% decline scenario"),
    ]
    .into_iter()
    .map(|(scenario, growth_rate, description)| Scenario {
        scenario: scenario.to_string(),
        growth_rate,
        description: description.to_string(),
    })
    .collect()
}

fn read_rows<T: serde::de::DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_reader(File::open(path)?);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Read a `model_type,rmse,mae,mse,accuracy` table
pub fn read_metrics_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ModelMetricsRow>> {
    read_rows(path)
}

/// Write a `model_type,rmse,mae,mse,accuracy` table
pub fn write_metrics_csv<P: AsRef<Path>>(path: P, rows: &[ModelMetricsRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a `scenario,growth_rate,description` table
pub fn read_scenarios_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Scenario>> {
    read_rows(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_metrics_csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model_metrics.csv");

        write_metrics_csv(&path, &reference_metrics()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("model_type,rmse,mae,mse,accuracy"));
        assert!(text.contains("lstm,111.6"));

        assert_eq!(read_metrics_csv(&path).unwrap(), reference_metrics());
    }

    #[test]
    fn test_default_scenarios() {
        let scenarios = default_scenarios();
        assert_eq!(scenarios.len(), 4);
        assert_eq!(scenarios[3].scenario, "pessimistic");
        assert_eq!(scenarios[3].growth_rate, -0.05);
    }

    #[test]
    fn test_sourced_serialization() {
        let json = serde_json::to_value(Sourced::built_in(default_scenarios())).unwrap();
        assert_eq!(json["source"], "built_in");
        assert_eq!(json["data"][1]["scenario"], "optimistic_5");
    }
}
