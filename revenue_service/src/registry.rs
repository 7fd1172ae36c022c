//! Fitted models and dashboard tables loaded at startup

use crate::artifacts::{self, Loaded};
use crate::config::ServiceConfig;
use crate::dashboard::{
    default_scenarios, read_metrics_csv, read_scenarios_csv, reference_metrics, ModelMetricsRow,
    Scenario, Sourced,
};
use revenue_forecast::data::SeriesLoader;
use revenue_forecast::models::{Forecaster, ModelKind};
use revenue_forecast::TimeSeries;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// A model that can answer requests, or why it cannot
#[derive(Debug, Clone)]
pub enum ModelSlot {
    /// Fitted model ready to forecast
    Ready(Arc<dyn Forecaster>),
    /// What is missing or broken
    Unavailable(String),
}

/// Immutable snapshot of everything the service serves from
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<ModelKind, ModelSlot>,
    history: Option<TimeSeries>,
    metrics: Sourced<Vec<ModelMetricsRow>>,
    scenarios: Sourced<Vec<Scenario>>,
}

impl ModelRegistry {
    /// Load artifacts and data tables described by `config`.
    ///
    /// Never fails: anything missing or unreadable is logged and replaced by
    /// an unavailable slot or built-in data.
    pub fn load(config: &ServiceConfig) -> Self {
        let mut models = HashMap::new();

        let sequence = match artifacts::load_sequence(
            config.sequence_model_path(),
            config.scaler_path(),
        ) {
            Ok(Loaded::Ready(model)) => ModelSlot::Ready(Arc::new(model)),
            Ok(Loaded::Missing(files)) => ModelSlot::Unavailable(files.join(", ")),
            Err(e) => ModelSlot::Unavailable(format!("unreadable sequence model: {}", e)),
        };
        models.insert(ModelKind::Sequence, sequence);

        let seasonal = match artifacts::load_seasonal(config.seasonal_model_path()) {
            Ok(Loaded::Ready(model)) => ModelSlot::Ready(Arc::new(model)),
            Ok(Loaded::Missing(files)) => ModelSlot::Unavailable(files.join(", ")),
            Err(e) => ModelSlot::Unavailable(format!("unreadable seasonal model: {}", e)),
        };
        models.insert(ModelKind::Seasonal, seasonal);

        for (kind, slot) in &models {
            match slot {
                ModelSlot::Ready(model) => info!(model = %kind, name = %model.name(), "model loaded"),
                ModelSlot::Unavailable(reason) => warn!(model = %kind, reason = %reason, "model unavailable"),
            }
        }

        Self {
            models,
            history: load_history(&config.history_path()),
            metrics: load_table(&config.metrics_path(), |p| read_metrics_csv(p), reference_metrics),
            scenarios: load_table(&config.scenario_path(), |p| read_scenarios_csv(p), default_scenarios),
        }
    }

    /// Registry with no models and built-in tables
    pub fn empty() -> Self {
        let models = ModelKind::ALL
            .into_iter()
            .map(|kind| (kind, ModelSlot::Unavailable("no model registered".to_string())))
            .collect();
        Self {
            models,
            history: None,
            metrics: Sourced::built_in(reference_metrics()),
            scenarios: Sourced::built_in(default_scenarios()),
        }
    }

    /// Replace the model for `kind`
    pub fn with_model(mut self, model: Arc<dyn Forecaster>) -> Self {
        self.models.insert(model.kind(), ModelSlot::Ready(model));
        self
    }

    /// Replace the base history
    pub fn with_history(mut self, history: TimeSeries) -> Self {
        self.history = Some(history);
        self
    }

    /// Fitted model for `kind`, or what is missing
    pub fn model(&self, kind: ModelKind) -> Result<&Arc<dyn Forecaster>, String> {
        match self.models.get(&kind) {
            Some(ModelSlot::Ready(model)) => Ok(model),
            Some(ModelSlot::Unavailable(reason)) => Err(reason.clone()),
            None => Err(format!("no {} model registered", kind)),
        }
    }

    /// Kinds with a fitted model, in display order
    pub fn available(&self) -> Vec<ModelKind> {
        ModelKind::ALL
            .into_iter()
            .filter(|kind| self.model(*kind).is_ok())
            .collect()
    }

    /// Loaded revenue history
    pub fn history(&self) -> Option<&TimeSeries> {
        self.history.as_ref()
    }

    /// Model metrics table
    pub fn metrics(&self) -> &Sourced<Vec<ModelMetricsRow>> {
        &self.metrics
    }

    /// Scenario table
    pub fn scenarios(&self) -> &Sourced<Vec<Scenario>> {
        &self.scenarios
    }
}

fn load_history(path: &Path) -> Option<TimeSeries> {
    if !path.exists() {
        info!(path = %path.display(), "no revenue history file");
        return None;
    }
    match SeriesLoader::from_csv(path) {
        Ok(series) => {
            info!(
                path = %path.display(),
                months = series.len(),
                last = %series.last_date(),
                "revenue history loaded"
            );
            Some(series)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "revenue history unreadable");
            None
        }
    }
}

fn load_table<T, R, D>(path: &Path, read: R, built_in: D) -> Sourced<Vec<T>>
where
    R: Fn(&Path) -> crate::error::Result<Vec<T>>,
    D: Fn() -> Vec<T>,
{
    if !path.exists() {
        return Sourced::built_in(built_in());
    }
    match read(path) {
        Ok(rows) if !rows.is_empty() => Sourced::file(rows),
        Ok(_) => {
            warn!(path = %path.display(), "table is empty, using built-in data");
            Sourced::built_in(built_in())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "table unreadable, using built-in data");
            Sourced::built_in(built_in())
        }
    }
}
