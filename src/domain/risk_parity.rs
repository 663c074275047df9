//! Equal-risk-contribution allocation.

use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::domain::solver::{self, Solution, SolverSettings, WeightBounds};
use ndarray::{Array1, Array2};

const OBJECTIVE_SCALE: f64 = 1000.0;

/// `1000 * sum_i (rc_i - vol/n)^2` with `rc = w * (S_ann w) / vol`.
pub fn objective(weights: &Array1<f64>, annual_covariance: &Array2<f64>) -> f64 {
    let n = weights.len() as f64;
    let marginal = annual_covariance.dot(weights);
    let vol = weights.dot(&marginal).max(0.0).sqrt();
    let contributions = weights * &(marginal / vol);
    let target = vol / n;
    contributions.mapv(|rc| (rc - target).powi(2)).sum() * OBJECTIVE_SCALE
}

pub fn optimize(covariance: &Array2<f64>, bounds: &WeightBounds, settings: &SolverSettings) -> Solution {
    let annual = covariance * TRADING_DAYS_PER_YEAR;
    solver::minimize(|w| objective(w, &annual), covariance.nrows(), bounds, settings)
}
