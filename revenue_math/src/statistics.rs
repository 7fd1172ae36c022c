//! Descriptive statistics and residual whiteness tests

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty slice".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`)
pub fn std_dev(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(variance.sqrt())
}

/// Sample autocorrelation at lags `1..=max_lag`
pub fn autocorrelations(values: &[f64], max_lag: usize) -> Result<Vec<f64>> {
    let n = values.len();
    if n <= max_lag {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations for {} lags, got {}",
            max_lag, max_lag, n
        )));
    }
    let m = mean(values)?;
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let denominator: f64 = centered.iter().map(|v| v * v).sum();
    if denominator == 0.0 {
        return Ok(vec![0.0; max_lag]);
    }

    Ok((1..=max_lag)
        .map(|k| {
            centered[k..]
                .iter()
                .zip(&centered[..n - k])
                .map(|(a, b)| a * b)
                .sum::<f64>()
                / denominator
        })
        .collect())
}

/// Result of a Ljung-Box portmanteau test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LjungBox {
    /// Q statistic
    pub statistic: f64,
    /// Upper-tail probability under the chi-squared null
    pub p_value: f64,
    /// Number of lags included
    pub lags: usize,
}

impl LjungBox {
    /// True when the null of no autocorrelation is not rejected at `alpha`
    pub fn is_white_noise(&self, alpha: f64) -> bool {
        self.p_value > alpha
    }
}

/// Ljung-Box test over `lags` lags.
///
/// Needs more than `lags` residuals. Degrees of freedom equal the number of
/// lags (no adjustment for fitted parameters).
pub fn ljung_box(residuals: &[f64], lags: usize) -> Result<LjungBox> {
    let n = residuals.len();
    if n < 3 {
        return Err(MathError::InsufficientData(format!(
            "Ljung-Box needs at least 3 residuals, got {}",
            n
        )));
    }
    if lags == 0 {
        return Err(MathError::InvalidInput("lags must be positive".to_string()));
    }
    let acf = autocorrelations(residuals, lags)?;

    let nf = n as f64;
    let statistic = nf
        * (nf + 2.0)
        * acf
            .iter()
            .enumerate()
            .map(|(i, r)| r * r / (nf - (i + 1) as f64))
            .sum::<f64>();

    let chi2 = ChiSquared::new(lags as f64)
        .map_err(|e| MathError::CalculationError(format!("Chi-squared distribution: {}", e)))?;
    let p_value = (1.0 - chi2.cdf(statistic)).clamp(0.0, 1.0);

    Ok(LjungBox {
        statistic,
        p_value,
        lags,
    })
}

/// Two-sided standard normal critical value for a confidence `level` in (0, 1)
pub fn normal_critical_value(level: f64) -> Result<f64> {
    if !(level > 0.0 && level < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Confidence level must be in (0, 1), got {}",
            level
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| MathError::CalculationError(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf(0.5 + level / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&values).unwrap(), 5.0);
        assert_abs_diff_eq!(std_dev(&values).unwrap(), 2.0);
        assert!(mean(&[]).is_err());
    }

    #[test]
    fn test_autocorrelation_alternating() {
        let values: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let acf = autocorrelations(&values, 2).unwrap();
        assert!(acf[0] < -0.9);
        assert!(acf[1] > 0.8);
    }

    #[test]
    fn test_ljung_box_detects_autocorrelation() {
        let trending: Vec<f64> = (0..60).map(|i| (i as f64 / 6.0).sin()).collect();
        let result = ljung_box(&trending, 10).unwrap();
        assert_eq!(result.lags, 10);
        assert!(result.statistic > 0.0);
        assert!(result.p_value < 0.01);
        assert!(!result.is_white_noise(0.05));
    }

    #[test]
    fn test_ljung_box_constant_residuals() {
        let result = ljung_box(&[0.5; 20], 10).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert_abs_diff_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_ljung_box_short_series() {
        assert!(ljung_box(&[1.0, 2.0], 10).is_err());

        let short = [1.0, -1.0, 2.0, 0.5, 0.0, 1.5, -0.5, 1.0, 2.0, -1.0];
        assert!(matches!(
            ljung_box(&short, 10),
            Err(MathError::InsufficientData(_))
        ));

        let result = ljung_box(&short, 3).unwrap();
        assert_eq!(result.lags, 3);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[rstest]
    #[case(0.95, 1.959964)]
    #[case(0.90, 1.644854)]
    #[case(0.99, 2.575829)]
    fn test_normal_critical_value(#[case] level: f64, #[case] expected: f64) {
        assert_abs_diff_eq!(normal_critical_value(level).unwrap(), expected, epsilon = 1e-5);
    }

    #[test]
    fn test_normal_critical_value_rejects_bad_level() {
        assert!(normal_critical_value(0.0).is_err());
        assert!(normal_critical_value(1.0).is_err());
    }
}
