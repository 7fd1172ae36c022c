//! # Revenue Service
//!
//! Serves monthly revenue forecasts from persisted models.
//!
//! [`ForecastingService`] loads the fitted sequence and seasonal models from a
//! model directory at startup. A request for a model that is missing or
//! fails is answered by a seeded synthetic generator with the same output
//! shape, and the outcome records which of the two produced it. The service
//! also serves the metric, history and scenario tables of the dashboard and
//! hands every forecast to a [`ForecastRunSink`].
//!
//! ```no_run
//! use revenue_forecast::ModelKind;
//! use revenue_service::{ForecastingService, ServiceConfig};
//!
//! # fn main() -> revenue_service::Result<()> {
//! let service = ForecastingService::new(ServiceConfig::load(None)?)?;
//! let outcome = service.generate_forecast(ModelKind::Seasonal, 12)?;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fallback;
pub mod registry;
pub mod runs;
pub mod service;

// Re-export commonly used types
pub use crate::config::ServiceConfig;
pub use crate::error::{Result, ServiceError};
pub use crate::fallback::{FallbackReason, ForecastSource};
pub use crate::registry::ModelRegistry;
pub use crate::runs::{ForecastRun, ForecastRunSink, JsonLinesRunStore};
pub use crate::service::{ForecastOutcome, ForecastingService};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Install the `tracing` subscriber used by the binaries.
///
/// Honors `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
