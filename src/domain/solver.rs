//! Local solver for smooth objectives over the budget-and-box simplex
//! `{ w : sum(w) = 1, lo <= w_i <= hi }`.
//!
//! Projected gradient descent with Armijo backtracking. Gradients are central
//! finite differences, so objectives only need to be evaluable. The iterate
//! is always feasible because every step is projected exactly onto the set.

use crate::domain::error::AllocatorError;
use ndarray::Array1;
use serde::Serialize;

const GRADIENT_STEP: f64 = 1e-7;
const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MAX_STEP: f64 = 1e4;
const STATIONARY_STEP: f64 = 1e-12;
const PROJECTION_ITERATIONS: usize = 200;

pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Per-asset weight bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightBounds {
    pub min_weight: f64,
    pub max_weight: f64,
}

impl WeightBounds {
    pub const LONG_ONLY: WeightBounds = WeightBounds {
        min_weight: 0.0,
        max_weight: 1.0,
    };

    pub fn new(min_weight: f64, max_weight: f64) -> Result<Self, AllocatorError> {
        if !(0.0..=1.0).contains(&min_weight)
            || !(0.0..=1.0).contains(&max_weight)
            || min_weight > max_weight
        {
            return Err(AllocatorError::InvalidInput {
                reason: format!(
                    "weight bounds must satisfy 0 <= min ({min_weight}) <= max ({max_weight}) <= 1"
                ),
            });
        }
        Ok(Self {
            min_weight,
            max_weight,
        })
    }

    /// Whether some fully invested vector of `n` weights fits the bounds.
    pub fn admits(&self, n: usize) -> bool {
        let n = n as f64;
        n * self.min_weight <= 1.0 + 1e-12 && n * self.max_weight >= 1.0 - 1e-12
    }

    pub fn contains(&self, weights: &Array1<f64>, eps: f64) -> bool {
        weights
            .iter()
            .all(|&w| w >= self.min_weight - eps && w <= self.max_weight + eps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Converged,
    FellBackToEqualWeight,
}

/// A weight vector together with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub weights: Array1<f64>,
    pub status: SolveStatus,
}

impl Solution {
    pub fn converged(weights: Array1<f64>) -> Self {
        Self {
            weights,
            status: SolveStatus::Converged,
        }
    }

    pub fn equal_weight_fallback(n: usize) -> Self {
        Self {
            weights: equal_weights(n),
            status: SolveStatus::FellBackToEqualWeight,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.status == SolveStatus::FellBackToEqualWeight
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Stop once one accepted step improves the objective by less than this.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl SolverSettings {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

pub fn equal_weights(n: usize) -> Array1<f64> {
    if n == 0 {
        return Array1::zeros(0);
    }
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Euclidean projection onto `{ sum(w) = 1, lo <= w_i <= hi }`.
///
/// Finds the shift `tau` with `sum(clamp(v_i - tau, lo, hi)) = 1` by bisection;
/// the clamped sum is monotone in `tau`.
pub fn project(v: &Array1<f64>, bounds: &WeightBounds) -> Array1<f64> {
    let lo = bounds.min_weight;
    let hi = bounds.max_weight;
    let clamped_sum =
        |tau: f64| -> f64 { v.iter().map(|&x| (x - tau).clamp(lo, hi)).sum::<f64>() };

    let v_min = v.iter().copied().fold(f64::INFINITY, f64::min);
    let v_max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut tau_lo = v_min - hi;
    let mut tau_hi = v_max - lo;

    for _ in 0..PROJECTION_ITERATIONS {
        let mid = 0.5 * (tau_lo + tau_hi);
        if clamped_sum(mid) > 1.0 {
            tau_lo = mid;
        } else {
            tau_hi = mid;
        }
        if tau_hi - tau_lo <= f64::EPSILON * tau_hi.abs().max(1.0) {
            break;
        }
    }
    let tau = 0.5 * (tau_lo + tau_hi);
    v.mapv(|x| (x - tau).clamp(lo, hi))
}

fn numerical_gradient<F>(objective: &F, x: &Array1<f64>) -> Array1<f64>
where
    F: Fn(&Array1<f64>) -> f64,
{
    let mut grad = Array1::zeros(x.len());
    let mut shifted = x.clone();
    for i in 0..x.len() {
        let orig = shifted[i];
        shifted[i] = orig + GRADIENT_STEP;
        let up = objective(&shifted);
        shifted[i] = orig - GRADIENT_STEP;
        let down = objective(&shifted);
        shifted[i] = orig;
        grad[i] = (up - down) / (2.0 * GRADIENT_STEP);
    }
    grad
}

fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

/// Minimizes `objective` over the budget-and-box set starting from equal
/// weights. Any non-finite evaluation, infeasible bounds, or hitting the
/// iteration limit yields the equal-weight fallback.
pub fn minimize<F>(objective: F, n: usize, bounds: &WeightBounds, settings: &SolverSettings) -> Solution
where
    F: Fn(&Array1<f64>) -> f64,
{
    if n == 0 || !bounds.admits(n) {
        return Solution::equal_weight_fallback(n);
    }

    let mut x = project(&equal_weights(n), bounds);
    let mut fx = objective(&x);
    if !fx.is_finite() {
        return Solution::equal_weight_fallback(n);
    }

    let mut step = 1.0;
    for _ in 0..settings.max_iterations {
        let grad = numerical_gradient(&objective, &x);
        if grad.iter().any(|g| !g.is_finite()) {
            return Solution::equal_weight_fallback(n);
        }

        let mut accepted = None;
        let mut t = step;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = project(&(&x - &(&grad * t)), bounds);
            let direction = &candidate - &x;
            if inf_norm(&direction) < STATIONARY_STEP {
                return Solution::converged(x);
            }
            let f_candidate = objective(&candidate);
            if !f_candidate.is_finite() {
                return Solution::equal_weight_fallback(n);
            }
            if f_candidate <= fx + ARMIJO_C * grad.dot(&direction) {
                accepted = Some((candidate, f_candidate, t));
                break;
            }
            t *= 0.5;
        }

        let Some((candidate, f_candidate, t)) = accepted else {
            // No descent left at machine precision.
            return Solution::converged(x);
        };

        let improvement = fx - f_candidate;
        x = candidate;
        fx = f_candidate;
        if improvement < settings.tolerance {
            return Solution::converged(x);
        }
        step = (t * 2.0).min(MAX_STEP);
    }

    Solution::equal_weight_fallback(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn bounds_reject_inverted_range() {
        assert!(WeightBounds::new(0.5, 0.2).is_err());
        assert!(WeightBounds::new(-0.1, 0.5).is_err());
        assert!(WeightBounds::new(0.0, 1.2).is_err());
        assert!(WeightBounds::new(0.1, 0.5).is_ok());
    }

    #[test]
    fn bounds_admit_only_feasible_sizes() {
        let b = WeightBounds::new(0.1, 0.4).unwrap();
        assert!(!b.admits(2));
        assert!(b.admits(3));
        assert!(b.admits(10));
        assert!(!b.admits(11));
    }

    #[test]
    fn projection_of_feasible_point_is_identity() {
        let v = array![0.2, 0.3, 0.5];
        let p = project(&v, &WeightBounds::LONG_ONLY);
        for i in 0..3 {
            assert_abs_diff_eq!(p[i], v[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn projection_respects_caps() {
        let v = array![2.0, 0.0, 0.0];
        let bounds = WeightBounds::new(0.0, 0.5).unwrap();
        let p = project(&v, &bounds);
        assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p[0], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(p[1], 0.25, epsilon = 1e-9);
    }

    #[test]
    fn minimizes_separable_quadratic() {
        let target = array![0.5, 0.3, 0.2];
        let objective = |w: &Array1<f64>| (w - &target).mapv(|d| d * d).sum();
        let sol = minimize(
            objective,
            3,
            &WeightBounds::LONG_ONLY,
            &SolverSettings::with_tolerance(1e-12),
        );
        assert_eq!(sol.status, SolveStatus::Converged);
        for i in 0..3 {
            assert_abs_diff_eq!(sol.weights[i], target[i], epsilon = 1e-4);
        }
    }

    #[test]
    fn active_cap_binds() {
        let objective = |w: &Array1<f64>| -w[0];
        let bounds = WeightBounds::new(0.05, 0.6).unwrap();
        let sol = minimize(objective, 3, &bounds, &SolverSettings::with_tolerance(1e-10));
        assert_abs_diff_eq!(sol.weights[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(sol.weights.sum(), 1.0, epsilon = 1e-9);
        assert!(bounds.contains(&sol.weights, 1e-9));
    }

    #[test]
    fn nan_objective_falls_back() {
        let sol = minimize(
            |_: &Array1<f64>| f64::NAN,
            4,
            &WeightBounds::LONG_ONLY,
            &SolverSettings::with_tolerance(1e-6),
        );
        assert!(sol.is_fallback());
        assert_eq!(sol.weights, equal_weights(4));
    }

    #[test]
    fn infeasible_bounds_fall_back() {
        let bounds = WeightBounds::new(0.0, 0.2).unwrap();
        let sol = minimize(
            |w: &Array1<f64>| w.dot(w),
            3,
            &bounds,
            &SolverSettings::with_tolerance(1e-6),
        );
        assert_eq!(sol.status, SolveStatus::FellBackToEqualWeight);
    }

    #[test]
    fn iteration_limit_falls_back() {
        let settings = SolverSettings {
            tolerance: 0.0,
            max_iterations: 1,
        };
        let target = array![0.9, 0.05, 0.05];
        let sol = minimize(
            |w: &Array1<f64>| (w - &target).mapv(|d| d * d).sum(),
            3,
            &WeightBounds::LONG_ONLY,
            &settings,
        );
        assert!(sol.is_fallback());
    }

    proptest! {
        #[test]
        fn projection_lands_in_feasible_set(
            v in proptest::collection::vec(-3.0f64..3.0, 2..8),
            lo in 0.0f64..0.1,
            span in 0.2f64..0.9,
        ) {
            let hi = (lo + span).min(1.0);
            let bounds = WeightBounds::new(lo, hi).unwrap();
            prop_assume!(bounds.admits(v.len()));
            let p = project(&Array1::from(v), &bounds);
            prop_assert!((p.sum() - 1.0).abs() < 1e-6);
            prop_assert!(bounds.contains(&p, 1e-9));
        }
    }
}
