//! Lag-polynomial algebra for (seasonal) ARIMA models
//!
//! A polynomial `c` represents `c[0] + c[1] B + c[2] B^2 + ...` where `B` is the
//! backshift operator. Every polynomial built here has `c[0] == 1`.

use crate::{MathError, Result};

/// Multiply two lag polynomials
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product
}

/// Autoregressive polynomial `1 - c1 B^s - c2 B^2s - ...`
pub fn ar_polynomial(coefficients: &[f64], period: usize) -> Vec<f64> {
    lag_polynomial(coefficients, period, -1.0)
}

/// Moving-average polynomial `1 + c1 B^s + c2 B^2s + ...`
pub fn ma_polynomial(coefficients: &[f64], period: usize) -> Vec<f64> {
    lag_polynomial(coefficients, period, 1.0)
}

fn lag_polynomial(coefficients: &[f64], period: usize, sign: f64) -> Vec<f64> {
    let period = period.max(1);
    let mut poly = vec![0.0; coefficients.len() * period + 1];
    poly[0] = 1.0;
    for (i, &c) in coefficients.iter().enumerate() {
        poly[(i + 1) * period] = sign * c;
    }
    poly
}

/// Differencing operator `(1 - B)^d (1 - B^s)^D`
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    if seasonal_d > 0 {
        let period = period.max(1);
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = multiply(&poly, &seasonal);
        }
    }
    poly
}

/// Degree of a polynomial (index of its last non-zero coefficient)
pub fn degree(poly: &[f64]) -> usize {
    poly.iter().rposition(|&c| c != 0.0).unwrap_or(0)
}

/// Apply a polynomial filter to a series.
///
/// Returns `w[t] = sum_k poly[k] * y[t + deg - k]` for every position where the
/// full filter fits, so the output has `y.len() - deg` values.
pub fn apply(poly: &[f64], series: &[f64]) -> Result<Vec<f64>> {
    let deg = degree(poly);
    if series.len() <= deg {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} observations to apply a degree-{} filter, got {}",
            deg,
            deg,
            series.len()
        )));
    }
    Ok((deg..series.len())
        .map(|t| {
            poly.iter()
                .take(deg + 1)
                .enumerate()
                .map(|(k, &c)| c * series[t - k])
                .sum()
        })
        .collect())
}

/// First `count` psi-weights of the MA(inf) representation `ma(B) / ar(B)`
pub fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(count);
    for j in 0..count {
        let mut value = if j == 0 {
            1.0
        } else {
            ma.get(j).copied().unwrap_or(0.0)
        };
        for i in 1..=j.min(ar.len().saturating_sub(1)) {
            value -= ar[i] * psi[j - i];
        }
        psi.push(value);
    }
    psi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_multiply() {
        // (1 - 0.5B)(1 + 0.2B) = 1 - 0.3B - 0.1B^2
        let product = multiply(&[1.0, -0.5], &[1.0, 0.2]);
        assert_eq!(product.len(), 3);
        assert_abs_diff_eq!(product[0], 1.0);
        assert_abs_diff_eq!(product[1], -0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(product[2], -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_seasonal_polynomials() {
        let ar = ar_polynomial(&[0.4], 12);
        assert_eq!(ar.len(), 13);
        assert_eq!(ar[0], 1.0);
        assert_eq!(ar[12], -0.4);
        assert_eq!(degree(&ar), 12);

        let ma = ma_polynomial(&[0.3, 0.1], 1);
        assert_eq!(ma, vec![1.0, 0.3, 0.1]);
    }

    #[test]
    fn test_differencing_polynomial() {
        // (1 - B)(1 - B^4) = 1 - B - B^4 + B^5
        let poly = differencing_polynomial(1, 1, 4);
        assert_eq!(poly, vec![1.0, -1.0, 0.0, 0.0, -1.0, 1.0]);
        assert_eq!(differencing_polynomial(0, 0, 12), vec![1.0]);
    }

    #[test]
    fn test_apply_first_difference() {
        let diff = apply(&[1.0, -1.0], &[1.0, 3.0, 6.0, 10.0]).unwrap();
        assert_eq!(diff, vec![2.0, 3.0, 4.0]);

        assert!(apply(&[1.0, -1.0], &[1.0]).is_err());
    }

    #[test]
    fn test_psi_weights_ar1() {
        // AR(1) with phi = 0.5 has psi_j = 0.5^j
        let psi = psi_weights(&ar_polynomial(&[0.5], 1), &[1.0], 5);
        for (j, value) in psi.iter().enumerate() {
            assert_abs_diff_eq!(*value, 0.5f64.powi(j as i32), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_psi_weights_random_walk() {
        // (1 - B) y = e has psi_j = 1 for all j
        let psi = psi_weights(&differencing_polynomial(1, 0, 1), &[1.0], 6);
        assert!(psi.iter().all(|&p| (p - 1.0).abs() < 1e-12));
    }
}
