//! Mean-variance maximum-Sharpe allocation.

use crate::domain::metrics::{MIN_EFFECTIVE_VOL, TRADING_DAYS_PER_YEAR};
use crate::domain::solver::{self, Solution, SolverSettings, WeightBounds};
use ndarray::{Array1, Array2};

/// Coefficient of the `0.5 * sum(w_i^2)` penalty against corner solutions.
pub const L2_PENALTY: f64 = 0.5;

pub const SCORING_TOLERANCE: f64 = 1e-3;
pub const FINAL_TOLERANCE: f64 = 1e-6;

/// `-sharpe(w) + 0.5 * sum(w^2)` with daily `mean` and `covariance`.
pub fn objective(
    weights: &Array1<f64>,
    mean: &Array1<f64>,
    covariance: &Array2<f64>,
    risk_free_rate: f64,
) -> f64 {
    let ret = mean.dot(weights) * TRADING_DAYS_PER_YEAR;
    let var = weights.dot(&covariance.dot(weights)).max(0.0);
    let vol = var.sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    let excess_sharpe = (ret - risk_free_rate) / vol.max(MIN_EFFECTIVE_VOL);
    let penalty = L2_PENALTY * weights.dot(weights);
    -excess_sharpe + penalty
}

pub fn optimize(
    mean: &Array1<f64>,
    covariance: &Array2<f64>,
    risk_free_rate: f64,
    bounds: &WeightBounds,
    settings: &SolverSettings,
) -> Solution {
    solver::minimize(
        |w| objective(w, mean, covariance, risk_free_rate),
        mean.len(),
        bounds,
        settings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::solver::SolveStatus;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn final_settings() -> SolverSettings {
        SolverSettings::with_tolerance(FINAL_TOLERANCE)
    }

    #[test]
    fn isotropic_zero_mean_gives_equal_weights() {
        let cov = Array2::<f64>::eye(4) * 0.0001;
        let mean = Array1::zeros(4);
        let sol = optimize(&mean, &cov, 0.0, &WeightBounds::LONG_ONLY, &final_settings());

        assert_eq!(sol.status, SolveStatus::Converged);
        for w in sol.weights.iter() {
            assert_abs_diff_eq!(*w, 0.25, epsilon = 1e-6);
        }
    }

    #[test]
    fn tilts_toward_higher_return_asset() {
        let cov = array![[0.0001, 0.0], [0.0, 0.0001]];
        let mean = array![0.0012, 0.0002];
        let sol = optimize(&mean, &cov, 0.02, &WeightBounds::LONG_ONLY, &final_settings());
        assert!(sol.weights[0] > sol.weights[1]);
        assert_abs_diff_eq!(sol.weights.sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn respects_box_constraints() {
        let cov = array![
            [0.00010, 0.00002, 0.00001],
            [0.00002, 0.00040, 0.00003],
            [0.00001, 0.00003, 0.00090]
        ];
        let mean = array![0.0015, 0.0001, -0.0004];
        let bounds = WeightBounds::new(0.1, 0.5).unwrap();
        let sol = optimize(&mean, &cov, 0.03, &bounds, &final_settings());

        assert!((sol.weights.sum() - 1.0).abs() < 1e-6);
        assert!(bounds.contains(&sol.weights, 1e-6));
        assert_abs_diff_eq!(sol.weights[0], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn penalty_is_included_in_objective() {
        let cov = Array2::<f64>::eye(2) * 0.0001;
        let mean = Array1::zeros(2);
        let w = array![0.5, 0.5];
        assert_abs_diff_eq!(objective(&w, &mean, &cov, 0.0), 0.25, epsilon = 1e-12);
    }
}
