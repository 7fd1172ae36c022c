//! # Revenue Forecast Workspace
//!
//! Umbrella crate for the revenue forecasting workspace.
//!
//! - [`revenue_math`]: lag polynomials, the simplex optimizer and residual statistics
//! - [`revenue_forecast`]: monthly series, scaling and the sequence and seasonal forecasters
//! - [`revenue_service`]: artifact loading, synthetic fallback and dashboard data
//!
//! ## Example
//!
//! ```
//! use revenue_forecast_workspace::forecast::models::{ModelKind, GROWTH_5};
//! use revenue_forecast_workspace::service::{ForecastingService, ModelRegistry};
//! use revenue_forecast_workspace::service::runs::DiscardRuns;
//! use std::sync::Arc;
//!
//! let service = ForecastingService::from_registry(
//!     Default::default(),
//!     ModelRegistry::empty(),
//!     Arc::new(DiscardRuns),
//! );
//! let outcome = service.generate_forecast(ModelKind::Sequence, 3).unwrap();
//! assert!(outcome.is_synthetic());
//! let first = &outcome.records[0];
//! assert_eq!(first.growth_5, first.forecasted_revenue * GROWTH_5);
//! ```

pub use revenue_forecast as forecast;
pub use revenue_math as math;
pub use revenue_service as service;

/// Names of the member crates, in dependency order
pub const MEMBERS: [&str; 3] = [revenue_math::NAME, revenue_forecast::NAME, revenue_service::NAME];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members() {
        assert_eq!(MEMBERS, ["revenue_math", "revenue_forecast", "revenue_service"]);
    }
}
