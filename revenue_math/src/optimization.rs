//! Derivative-free minimization with the Nelder-Mead simplex method
//!
//! Used to estimate seasonal ARIMA coefficients by conditional sum of squares.
//! The objective is unconstrained; non-finite objective values are treated as
//! infinitely bad so the simplex moves away from explosive regions.

use crate::{MathError, Result};
use std::cmp::Ordering;

/// Tuning knobs for the simplex search
#[derive(Debug, Clone)]
pub struct SimplexOptions {
    /// Maximum number of simplex iterations
    pub max_iterations: usize,
    /// Relative tolerance on the spread of objective values across the simplex
    pub tolerance: f64,
    /// Absolute tolerance on the simplex diameter
    pub step_tolerance: f64,
    /// Size of the initial simplex step along each axis
    pub initial_step: f64,
    /// Reflection coefficient
    pub reflection: f64,
    /// Expansion coefficient
    pub expansion: f64,
    /// Contraction coefficient
    pub contraction: f64,
    /// Shrink coefficient
    pub shrink: f64,
}

impl Default for SimplexOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            tolerance: 1e-10,
            step_tolerance: 1e-10,
            initial_step: 0.1,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
        }
    }
}

impl SimplexOptions {
    /// Check that the coefficients describe a valid simplex search
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(MathError::InvalidInput(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance > 0.0) || !(self.step_tolerance > 0.0) {
            return Err(MathError::InvalidInput(
                "Tolerances must be positive".to_string(),
            ));
        }
        if !(self.initial_step > 0.0) {
            return Err(MathError::InvalidInput(
                "initial_step must be positive".to_string(),
            ));
        }
        if !(self.contraction > 0.0 && self.contraction < 1.0)
            || !(self.shrink > 0.0 && self.shrink < 1.0)
            || self.expansion <= 1.0
            || self.reflection <= 0.0
        {
            return Err(MathError::InvalidInput(
                "Invalid simplex coefficients".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a simplex search
#[derive(Debug, Clone)]
pub struct SimplexResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether a tolerance was met before the iteration budget ran out
    pub converged: bool,
}

/// Minimize `objective` starting from `initial`.
///
/// Returns an error only for invalid input; a search that exhausts its budget
/// is reported through [`SimplexResult::converged`].
pub fn nelder_mead<F>(objective: F, initial: &[f64], options: &SimplexOptions) -> Result<SimplexResult>
where
    F: Fn(&[f64]) -> f64,
{
    options.validate()?;
    let n = initial.len();
    if n == 0 {
        return Err(MathError::InvalidInput(
            "Cannot optimize over zero parameters".to_string(),
        ));
    }
    if initial.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Initial point must be finite".to_string(),
        ));
    }

    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(initial.to_vec());
    for i in 0..n {
        let mut vertex = initial.to_vec();
        vertex[i] += if initial[i].abs() > 1e-8 {
            options.initial_step * initial[i].abs().max(1.0)
        } else {
            options.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        let order = sorted_indices(&values);
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        let spread = values[worst] - values[best];
        if values[best].is_finite()
            && spread.is_finite()
            && spread <= options.tolerance * (values[best].abs() + options.tolerance)
        {
            converged = true;
            break;
        }
        if diameter(&simplex, best) < options.step_tolerance {
            converged = values[best].is_finite();
            break;
        }

        iterations += 1;
        let centroid = centroid_without(&simplex, worst);

        let reflected = along(&centroid, &simplex[worst], -options.reflection);
        let reflected_value = eval(&reflected);

        if reflected_value < values[best] {
            let expanded = along(&centroid, &simplex[worst], -options.reflection * options.expansion);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (candidate, candidate_value) = if reflected_value < values[worst] {
            let outside = along(&centroid, &reflected, options.contraction);
            let value = eval(&outside);
            (outside, value)
        } else {
            let inside = along(&centroid, &simplex[worst], options.contraction);
            let value = eval(&inside);
            (inside, value)
        };

        if candidate_value < values[worst].min(reflected_value) {
            simplex[worst] = candidate;
            values[worst] = candidate_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            let shrunk = along(&anchor, &simplex[i], options.shrink);
            values[i] = eval(&shrunk);
            simplex[i] = shrunk;
        }
    }

    let best = sorted_indices(&values)[0];
    Ok(SimplexResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    })
}

/// Point `origin + t * (target - origin)`
fn along(origin: &[f64], target: &[f64], t: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(target)
        .map(|(&o, &x)| o + t * (x - o))
        .collect()
}

fn sorted_indices(values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
    indices
}

fn centroid_without(simplex: &[Vec<f64>], excluded: usize) -> Vec<f64> {
    let n = simplex[0].len();
    let mut centroid = vec![0.0; n];
    for (i, vertex) in simplex.iter().enumerate() {
        if i == excluded {
            continue;
        }
        for (c, v) in centroid.iter_mut().zip(vertex) {
            *c += v;
        }
    }
    let count = (simplex.len() - 1) as f64;
    centroid.iter_mut().for_each(|c| *c /= count);
    centroid
}

fn diameter(simplex: &[Vec<f64>], best: usize) -> f64 {
    simplex
        .iter()
        .map(|v| {
            v.iter()
                .zip(&simplex[best])
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 3.0).powi(2) + 5.0,
            &[0.0, 0.0],
            &SimplexOptions::default(),
        )
        .unwrap();

        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(result.point[1], -3.0, epsilon = 1e-4);
        assert_abs_diff_eq!(result.value, 5.0, epsilon = 1e-8);
    }

    #[test]
    fn test_rosenbrock() {
        let rosenbrock =
            |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let result = nelder_mead(rosenbrock, &[-1.2, 1.0], &SimplexOptions::default()).unwrap();

        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(result.point[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_non_finite_regions_are_avoided() {
        let result = nelder_mead(
            |x| if x[0] > 1.0 { f64::NAN } else { (x[0] - 0.5).powi(2) },
            &[0.9],
            &SimplexOptions::default(),
        )
        .unwrap();

        assert!(result.value.is_finite());
        assert_abs_diff_eq!(result.point[0], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let options = SimplexOptions {
            max_iterations: 3,
            ..SimplexOptions::default()
        };
        let result = nelder_mead(
            |x| x.iter().map(|v| (v - 10.0).powi(2)).sum(),
            &[0.0, 0.0, 0.0],
            &options,
        )
        .unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn test_invalid_input() {
        assert!(nelder_mead(|_| 0.0, &[], &SimplexOptions::default()).is_err());
        assert!(nelder_mead(|_| 0.0, &[f64::NAN], &SimplexOptions::default()).is_err());

        let options = SimplexOptions {
            tolerance: 0.0,
            ..SimplexOptions::default()
        };
        assert!(nelder_mead(|_| 0.0, &[1.0], &options).is_err());
    }
}
