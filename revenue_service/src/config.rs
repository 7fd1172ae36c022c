//! Service configuration
//!
//! Settings come from serde defaults, then an optional JSON file, then
//! `REVENUE_FORECAST_*` environment variables, and are validated last.

use crate::error::{Result, ServiceError};
use revenue_forecast::models::sarima::SarimaConfig;
use revenue_forecast::models::sequence::SequenceConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "REVENUE_FORECAST_";

/// Sequence model weights and training history
pub const SEQUENCE_MODEL_FILE: &str = "sequence_model.json";
/// Scaler fitted alongside the sequence model
pub const SCALER_FILE: &str = "scaler.json";
/// Fitted seasonal model
pub const SEASONAL_MODEL_FILE: &str = "seasonal_model.json";
/// Monthly revenue history
pub const HISTORY_FILE: &str = "revenue_history.csv";
/// Holdout metrics written by training
pub const METRICS_FILE: &str = "model_metrics.csv";
/// Scenario table for the dashboard
pub const SCENARIO_FILE: &str = "scenario_inputs.csv";
/// Log of generated forecast runs
pub const RUNS_FILE: &str = "forecast_runs.jsonl";

/// Settings of the synthetic forecast generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Revenue level the synthetic forecast starts from
    pub base_revenue: f64,
    /// Seed of the synthetic noise
    pub seed: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            base_revenue: 1_000_000.0,
            seed: 42,
        }
    }
}

/// Settings used by the training binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Trailing months held out for evaluation
    pub holdout_months: usize,
    /// Sequence model structure and optimizer
    pub sequence: SequenceConfig,
    /// Seasonal model structure
    pub seasonal: SarimaConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_months: 12,
            sequence: SequenceConfig::default(),
            seasonal: SarimaConfig::default(),
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding the model artifacts
    pub model_dir: PathBuf,
    /// Directory holding history, metrics and scenario tables
    pub data_dir: PathBuf,
    /// Directory receiving the forecast run log
    pub output_dir: PathBuf,
    /// Largest forecast horizon accepted, in months
    pub max_periods: usize,
    /// Whether generated forecasts are appended to the run log
    pub record_runs: bool,
    /// Synthetic generator settings
    pub fallback: FallbackConfig,
    /// Training binary settings
    pub training: TrainingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            max_periods: 120,
            record_runs: true,
            fallback: FallbackConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults, overridden by `path` when given and then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file; missing fields keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            ServiceError::Config(format!(
                "Cannot open config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ServiceError::Config(format!(
                "Invalid config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Apply overrides from `lookup`, which maps a full variable name to its value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(dir) = get("MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get("MAX_PERIODS") {
            self.max_periods = parse_override("MAX_PERIODS", &raw)?;
        }
        if let Some(raw) = get("RECORD_RUNS") {
            self.record_runs = parse_override("RECORD_RUNS", &raw)?;
        }
        if let Some(raw) = get("FALLBACK_BASE") {
            self.fallback.base_revenue = parse_override("FALLBACK_BASE", &raw)?;
        }
        if let Some(raw) = get("FALLBACK_SEED") {
            self.fallback.seed = parse_override("FALLBACK_SEED", &raw)?;
        }
        if let Some(raw) = get("HOLDOUT_MONTHS") {
            self.training.holdout_months = parse_override("HOLDOUT_MONTHS", &raw)?;
        }
        Ok(())
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_periods == 0 {
            return Err(ServiceError::Config(
                "max_periods must be at least 1".to_string(),
            ));
        }
        if !(self.fallback.base_revenue.is_finite() && self.fallback.base_revenue > 0.0) {
            return Err(ServiceError::Config(format!(
                "fallback.base_revenue must be positive, got {}",
                self.fallback.base_revenue
            )));
        }
        if self.training.holdout_months == 0 {
            return Err(ServiceError::Config(
                "training.holdout_months must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the sequence model artifact
    pub fn sequence_model_path(&self) -> PathBuf {
        self.model_dir.join(SEQUENCE_MODEL_FILE)
    }

    /// Path of the scaler artifact
    pub fn scaler_path(&self) -> PathBuf {
        self.model_dir.join(SCALER_FILE)
    }

    /// Path of the seasonal model artifact
    pub fn seasonal_model_path(&self) -> PathBuf {
        self.model_dir.join(SEASONAL_MODEL_FILE)
    }

    /// Path of the revenue history table
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    /// Path of the model metrics table
    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir.join(METRICS_FILE)
    }

    /// Path of the scenario table
    pub fn scenario_path(&self) -> PathBuf {
        self.data_dir.join(SCENARIO_FILE)
    }

    /// Path of the forecast run log
    pub fn runs_path(&self) -> PathBuf {
        self.output_dir.join(RUNS_FILE)
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        ServiceError::Config(format!("{}{}='{}': {}", ENV_PREFIX, name, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_periods, 120);
        assert_eq!(config.scaler_path(), PathBuf::from("models/scaler.json"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<String, String> = [
            ("REVENUE_FORECAST_MODEL_DIR", "/srv/models"),
            ("REVENUE_FORECAST_MAX_PERIODS", " 24 "),
            ("REVENUE_FORECAST_FALLBACK_SEED", "7"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|key| vars.get(key).cloned()).unwrap();

        assert_eq!(config.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.max_periods, 24);
        assert_eq!(config.fallback.seed, 7);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let mut config = ServiceConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "REVENUE_FORECAST_MAX_PERIODS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"max_periods": 36, "fallback": {"seed": 1}}"#).unwrap();
        assert_eq!(config.max_periods, 36);
        assert_eq!(config.fallback.seed, 1);
        assert_eq!(config.fallback.base_revenue, 1_000_000.0);
        assert_eq!(config.training.holdout_months, 12);
    }
}
