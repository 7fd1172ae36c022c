//! Reversible min-max scaling
//!
//! The sequence forecaster trains on values mapped into a fixed range; the
//! fitted [`MinMaxScaler`] is persisted next to the model so forecasts can be
//! mapped back to revenue.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Min-max scaler fitted on one series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Smallest value seen at fit time
    data_min: f64,
    /// Largest value seen at fit time
    data_max: f64,
    /// Lower end of the target range
    range_min: f64,
    /// Upper end of the target range
    range_max: f64,
}

impl MinMaxScaler {
    /// Fit a scaler mapping `values` into `[0, 1]`
    pub fn fit(values: &[f64]) -> Result<Self> {
        Self::fit_with_range(values, (0.0, 1.0))
    }

    /// Fit a scaler mapping `values` into `range`
    pub fn fit_with_range(values: &[f64], range: (f64, f64)) -> Result<Self> {
        let (range_min, range_max) = range;
        if !(range_min.is_finite() && range_max.is_finite() && range_min < range_max) {
            return Err(ForecastError::InvalidParameter(format!(
                "Invalid feature range ({}, {})",
                range_min, range_max
            )));
        }
        if values.is_empty() {
            return Err(ForecastError::InsufficientDataError(
                "Cannot fit a scaler on an empty series".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::DataFormatError(
                "Cannot fit a scaler on non-finite values".to_string(),
            ));
        }

        let data_min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let data_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Ok(Self {
            data_min,
            data_max,
            range_min,
            range_max,
        })
    }

    /// Multiplier applied after shifting by `data_min`.
    ///
    /// A constant series has no spread; it scales by 1 so every value maps to
    /// the range floor and maps back exactly.
    fn scale(&self) -> f64 {
        let spread = self.data_max - self.data_min;
        if spread > 0.0 {
            (self.range_max - self.range_min) / spread
        } else {
            1.0
        }
    }

    /// Map a value into the scaled range
    pub fn transform_value(&self, value: f64) -> f64 {
        (value - self.data_min) * self.scale() + self.range_min
    }

    /// Map a scaled value back to the original units
    pub fn inverse_transform_value(&self, scaled: f64) -> f64 {
        (scaled - self.range_min) / self.scale() + self.data_min
    }

    /// Scale a batch of values
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform_value(v)).collect()
    }

    /// Map a batch of scaled values back to original units
    pub fn inverse_transform(&self, scaled: &[f64]) -> Vec<f64> {
        scaled
            .iter()
            .map(|&v| self.inverse_transform_value(v))
            .collect()
    }

    /// Smallest and largest values seen at fit time
    pub fn data_range(&self) -> (f64, f64) {
        (self.data_min, self.data_max)
    }

    /// Target range
    pub fn feature_range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_maps_extremes_to_range() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 15.0]).unwrap();
        assert_eq!(scaler.transform(&[10.0, 20.0, 15.0]), vec![0.0, 1.0, 0.5]);
        assert_eq!(scaler.data_range(), (10.0, 20.0));
    }

    #[test]
    fn test_custom_range() {
        let scaler = MinMaxScaler::fit_with_range(&[0.0, 4.0], (-1.0, 1.0)).unwrap();
        assert_relative_eq!(scaler.transform_value(2.0), 0.0);
        assert_relative_eq!(scaler.inverse_transform_value(1.0), 4.0);
    }

    #[test]
    fn test_constant_series_is_identity_scale() {
        let scaler = MinMaxScaler::fit(&[1000.0; 5]).unwrap();
        assert_eq!(scaler.transform_value(1000.0), 0.0);
        assert_eq!(scaler.inverse_transform_value(0.0), 1000.0);
        assert_eq!(scaler.inverse_transform_value(0.25), 1000.25);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            MinMaxScaler::fit(&[]),
            Err(ForecastError::InsufficientDataError(_))
        ));
        assert!(matches!(
            MinMaxScaler::fit(&[1.0, f64::INFINITY]),
            Err(ForecastError::DataFormatError(_))
        ));
        assert!(MinMaxScaler::fit_with_range(&[1.0], (1.0, 0.0)).is_err());
    }
}
