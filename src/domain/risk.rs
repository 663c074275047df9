//! Per-asset risk decomposition.

use crate::domain::metrics::portfolio_variance;
use ndarray::{Array1, Array2};
use serde::Serialize;

/// Normalized risk contributions `w_i (S w)_i / (w' S w)`.
///
/// Components sum to 1 whenever the portfolio volatility is nonzero; a
/// zero-volatility portfolio yields a zero vector.
pub fn risk_contributions(weights: &Array1<f64>, covariance: &Array2<f64>) -> Array1<f64> {
    let port_vol = portfolio_variance(weights, covariance).sqrt();
    if port_vol == 0.0 {
        return Array1::zeros(weights.len());
    }
    let marginal = covariance.dot(weights) / port_vol;
    let contribution = weights * &marginal;
    contribution / port_vol
}

/// One asset's share of total portfolio risk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskShare {
    pub ticker: String,
    pub weight: f64,
    /// Fraction of portfolio volatility, in [0, 1] for long-only weights.
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RiskDecomposition {
    pub shares: Vec<RiskShare>,
}

impl RiskDecomposition {
    /// Decomposition restricted to assets with strictly positive weight.
    pub fn compute(tickers: &[String], weights: &Array1<f64>, covariance: &Array2<f64>) -> Self {
        let active: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
        if active.is_empty() {
            return Self::default();
        }

        let w_active = Array1::from_iter(active.iter().map(|&i| weights[i]));
        let cov_active =
            Array2::from_shape_fn((active.len(), active.len()), |(a, b)| {
                covariance[[active[a], active[b]]]
            });
        let contributions = risk_contributions(&w_active, &cov_active);

        let shares = active
            .iter()
            .zip(contributions.iter())
            .map(|(&i, &contribution)| RiskShare {
                ticker: tickers[i].clone(),
                weight: weights[i],
                contribution,
            })
            .collect();
        RiskDecomposition { shares }
    }

    pub fn total(&self) -> f64 {
        self.shares.iter().map(|s| s.contribution).sum()
    }
}
