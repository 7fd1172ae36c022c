//! Print one forecast run as JSON.
//!
//! Usage: `forecast [lstm|sarima] [periods] [config.json]`

use revenue_forecast::ModelKind;
use revenue_service::{init_tracing, ForecastingService, Result, ServiceConfig, ServiceError};
use std::path::PathBuf;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let kind: ModelKind = match args.next() {
        Some(raw) => raw.parse()?,
        None => ModelKind::Sequence,
    };
    let periods = match args.next() {
        Some(raw) => raw.parse::<usize>().map_err(|e| {
            ServiceError::InvalidRequest(format!("periods '{}' is not a number: {}", raw, e))
        })?,
        None => 12,
    };
    let config_path = args.next().map(PathBuf::from);

    let config = ServiceConfig::load(config_path.as_deref())?;
    let service = ForecastingService::new(config)?;
    let outcome = service.generate_forecast(kind, periods)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
