//! Random long-only portfolios for the risk/return scatter.
//!
//! Sampling is the only nondeterministic step in the crate, so the RNG is
//! always supplied by the caller.

use crate::domain::metrics::RiskReturn;
use ndarray::{Array1, Array2};
use rand::Rng;

pub const DEFAULT_SAMPLES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrontierPoint {
    pub annual_volatility: f64,
    pub annual_return: f64,
}

/// Draws `samples` uniform weight vectors normalized to sum to 1 and reports
/// each one's annualized volatility and return.
pub fn sample_cloud<R: Rng + ?Sized>(
    rng: &mut R,
    mean: &Array1<f64>,
    covariance: &Array2<f64>,
    samples: usize,
) -> Vec<FrontierPoint> {
    let n = mean.len();
    if n == 0 {
        return Vec::new();
    }
    (0..samples)
        .map(|_| {
            let raw = Array1::from_shape_fn(n, |_| rng.gen_range(f64::EPSILON..1.0));
            let weights = &raw / raw.sum();
            let rr = RiskReturn::compute(&weights, mean, covariance, 0.0);
            FrontierPoint {
                annual_volatility: rr.annual_volatility,
                annual_return: rr.annual_return,
            }
        })
        .collect()
}
