use chrono::NaiveDate;
use revenue_forecast::data::TimeSeries;
use revenue_forecast::models::lstm::TrainingOptions;
use revenue_forecast::models::sarima::SeasonalForecaster;
use revenue_forecast::models::sequence::{SequenceConfig, SequenceForecaster};
use revenue_forecast::models::Forecaster;
use revenue_forecast::utils::train_test_split;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Revenue Forecast: Basic Forecasting Example");
    println!("===========================================\n");

    let series = create_sample_revenue()?;
    println!(
        "Sample data created: {} months from {} to {}\n",
        series.len(),
        series.first_date(),
        series.last_date()
    );

    let (train, test) = train_test_split(&series, 12)?;

    println!("Training models...");
    let mut lstm = SequenceForecaster::with_config(SequenceConfig {
        hidden_units: 16,
        training: TrainingOptions {
            epochs: 50,
            ..TrainingOptions::default()
        },
        ..SequenceConfig::default()
    })?;
    lstm.fit(&train)?;

    let mut sarima = SeasonalForecaster::default();
    sarima.fit(&train)?;
    println!("Models trained successfully\n");

    // The LSTM evaluates on windows inside the holdout, so give it the
    // lookback months that precede the test year as well
    let lstm_test = series.tail(test.len() + lstm.lookback())?;
    println!("{} on the holdout:\n{}", lstm.name(), lstm.evaluate(&lstm_test)?);
    println!("{} on the holdout:\n{}", sarima.name(), sarima.evaluate(&test)?);
    println!("{}", sarima.diagnostics()?);

    println!("Seasonal forecast (6 months):");
    for record in sarima.forecast(6)?.records {
        println!(
            "  {}: {:.0} ({:.0} .. {:.0})",
            record.date,
            record.forecasted_revenue,
            record.lower_bound.unwrap_or(f64::NAN),
            record.upper_bound.unwrap_or(f64::NAN)
        );
    }

    println!("\nSequence forecast (6 months):");
    for record in lstm.forecast(6)?.records {
        println!(
            "  {}: {:.0} (+5%: {:.0}, -5%: {:.0})",
            record.date, record.forecasted_revenue, record.growth_5, record.decline_5
        );
    }

    Ok(())
}

/// Five years of monthly revenue with trend and yearly seasonality
fn create_sample_revenue() -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2019, 1, 1).ok_or("invalid start date")?;
    let values = (0..60)
        .map(|i| {
            let t = i as f64;
            let seasonal = (t * std::f64::consts::PI / 6.0).sin() * 80_000.0;
            let wobble = ((t * 1.7).sin() + (t * 0.3).cos()) * 10_000.0;
            1_000_000.0 + 5_000.0 * t + seasonal + wobble
        })
        .collect();
    Ok(TimeSeries::monthly(start, values)?)
}
