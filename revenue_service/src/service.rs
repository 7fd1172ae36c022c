//! The forecasting service: model dispatch with a synthetic fallback

use crate::config::ServiceConfig;
use crate::dashboard::{history_points, HistoricalPoint, ModelMetricsRow, Scenario, Sourced};
use crate::error::{Result, ServiceError};
use crate::fallback::{FallbackReason, ForecastSource, SyntheticGenerator};
use crate::registry::ModelRegistry;
use crate::runs::{DiscardRuns, ForecastRun, ForecastRunSink, JsonLinesRunStore};
use chrono::{DateTime, Utc};
use revenue_forecast::models::{ForecastRecord, ModelKind};
use revenue_forecast::utils::month_start;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};

/// A forecast together with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutcome {
    /// Requested model family
    pub model: ModelKind,
    /// Model or synthetic provenance
    pub source: ForecastSource,
    /// When the forecast was produced
    pub generated_at: DateTime<Utc>,
    /// One record per forecast month
    pub records: Vec<ForecastRecord>,
}

impl ForecastOutcome {
    /// True when the synthetic generator produced the records
    pub fn is_synthetic(&self) -> bool {
        self.source.is_synthetic()
    }

    fn to_run(&self) -> ForecastRun {
        ForecastRun {
            model_type: self.model,
            periods: self.records.len(),
            generated_at: self.generated_at,
            source: self.source.clone(),
            records: self.records.clone(),
        }
    }
}

/// Serves forecasts and dashboard data from a reloadable model registry
pub struct ForecastingService {
    config: ServiceConfig,
    registry: RwLock<Arc<ModelRegistry>>,
    generator: SyntheticGenerator,
    sink: Arc<dyn ForecastRunSink>,
}

impl std::fmt::Debug for ForecastingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastingService")
            .field("config", &self.config)
            .field("available", &self.available_models())
            .finish()
    }
}

impl ForecastingService {
    /// Validate `config`, load its artifacts and log runs per its settings
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let sink: Arc<dyn ForecastRunSink> = if config.record_runs {
            Arc::new(JsonLinesRunStore::new(config.runs_path()))
        } else {
            Arc::new(DiscardRuns)
        };
        Self::with_sink(config, sink)
    }

    /// Like [`ForecastingService::new`] with an explicit run sink
    pub fn with_sink(config: ServiceConfig, sink: Arc<dyn ForecastRunSink>) -> Result<Self> {
        config.validate()?;
        let registry = ModelRegistry::load(&config);
        Ok(Self::from_registry(config, registry, sink))
    }

    /// Service over an already built registry
    pub fn from_registry(
        config: ServiceConfig,
        registry: ModelRegistry,
        sink: Arc<dyn ForecastRunSink>,
    ) -> Self {
        let generator = SyntheticGenerator::new(config.fallback.base_revenue, config.fallback.seed);
        Self {
            config,
            registry: RwLock::new(Arc::new(registry)),
            generator,
            sink,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Current registry snapshot
    pub fn registry(&self) -> Arc<ModelRegistry> {
        match self.registry.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Reload every artifact and table, then swap the registry in one step
    pub fn reload(&self) {
        let fresh = Arc::new(ModelRegistry::load(&self.config));
        info!(available = ?fresh.available(), "registry reloaded");
        match self.registry.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }

    /// Model kinds with a fitted model loaded
    pub fn available_models(&self) -> Vec<ModelKind> {
        self.registry().available()
    }

    /// Forecast `periods` months with `kind`, falling back to synthetic data
    /// when the model is unavailable or fails.
    ///
    /// Only invalid requests are errors.
    pub fn generate_forecast(&self, kind: ModelKind, periods: usize) -> Result<ForecastOutcome> {
        if periods == 0 || periods > self.config.max_periods {
            return Err(ServiceError::InvalidRequest(format!(
                "periods must be between 1 and {}, got {}",
                self.config.max_periods, periods
            )));
        }

        let registry = self.registry();
        let attempt = match registry.model(kind) {
            Ok(model) => model
                .forecast(periods)
                .map_err(|e| FallbackReason::ModelFailed { error: e.to_string() }),
            Err(missing) => Err(FallbackReason::Unavailable { missing }),
        };

        let (source, records) = match attempt {
            Ok(result) => (ForecastSource::Model, result.records),
            Err(reason) => {
                match &reason {
                    FallbackReason::Unavailable { missing } => {
                        warn!(model = %kind, missing = %missing, "model unavailable, using synthetic forecast")
                    }
                    FallbackReason::ModelFailed { error } => {
                        error!(model = %kind, error = %error, "model failed, using synthetic forecast")
                    }
                }
                let last_month = registry
                    .history()
                    .map(|h| h.last_date())
                    .unwrap_or_else(|| month_start(Utc::now().date_naive()));
                let result = self.generator.forecast(kind, last_month, periods)?;
                (ForecastSource::Synthetic { reason }, result.records)
            }
        };

        let outcome = ForecastOutcome {
            model: kind,
            source,
            generated_at: Utc::now(),
            records,
        };
        if let Err(e) = self.sink.record(&outcome.to_run()) {
            warn!(model = %kind, error = %e, "failed to record forecast run");
        }
        Ok(outcome)
    }

    /// Holdout metrics per model family
    pub fn model_metrics(&self) -> Sourced<Vec<ModelMetricsRow>> {
        self.registry().metrics().clone()
    }

    /// Revenue history, or the built-in series when none is loaded
    pub fn historical_data(&self) -> Result<Sourced<Vec<HistoricalPoint>>> {
        match self.registry().history() {
            Some(history) => Ok(Sourced::file(history_points(history))),
            None => Ok(Sourced::built_in(history_points(&self.generator.history()?))),
        }
    }

    /// Scenario table
    pub fn scenario_data(&self) -> Sourced<Vec<Scenario>> {
        self.registry().scenarios().clone()
    }
}
