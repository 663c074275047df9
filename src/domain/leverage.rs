//! Uniform leverage scaling toward a volatility or VaR target.
//!
//! Scaled weights may sum to more than 1; gross exposure above 100% is the
//! caller's decision to accept.

use crate::domain::metrics::{annualized_volatility, historical_var};
use crate::domain::prices::ReturnMatrix;
use ndarray::{Array1, Array2};
use serde::Serialize;

pub const DEFAULT_MAX_VOL_LEVERAGE: f64 = 3.0;
pub const DEFAULT_MAX_VAR_LEVERAGE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum RiskTarget {
    /// Annualized volatility as a fraction (0.15 = 15%).
    Volatility(f64),
    /// One-day historical VaR as a percentage (1.5 = 1.5%).
    Var(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeverageCaps {
    pub volatility: f64,
    pub var: f64,
}

impl Default for LeverageCaps {
    fn default() -> Self {
        Self {
            volatility: DEFAULT_MAX_VOL_LEVERAGE,
            var: DEFAULT_MAX_VAR_LEVERAGE,
        }
    }
}

/// Scales `weights` so annualized volatility hits `target_vol`, capped at
/// `max_leverage`. Zero-volatility portfolios are returned unchanged.
pub fn scale_to_volatility(
    weights: &Array1<f64>,
    covariance: &Array2<f64>,
    target_vol: f64,
    max_leverage: f64,
) -> Array1<f64> {
    let current = annualized_volatility(weights, covariance);
    if current == 0.0 {
        return weights.clone();
    }
    let leverage = (target_vol / current).min(max_leverage);
    weights * leverage
}

/// Scales `weights` so historical VaR at `confidence` hits `target_var_pct`,
/// capped at `max_leverage`. A zero current VaR leaves weights unchanged.
pub fn scale_to_var(
    weights: &Array1<f64>,
    returns: &ReturnMatrix,
    target_var_pct: f64,
    confidence: f64,
    max_leverage: f64,
) -> Array1<f64> {
    let current = historical_var(weights, returns, confidence);
    if current == 0.0 {
        return weights.clone();
    }
    let leverage = (target_var_pct / current).min(max_leverage);
    weights * leverage
}

/// Applies `target` (if any) to `weights`.
pub fn apply_target(
    weights: &Array1<f64>,
    target: Option<RiskTarget>,
    covariance: &Array2<f64>,
    returns: &ReturnMatrix,
    confidence: f64,
    caps: &LeverageCaps,
) -> Array1<f64> {
    match target {
        Some(RiskTarget::Volatility(v)) if v > 0.0 => {
            scale_to_volatility(weights, covariance, v, caps.volatility)
        }
        Some(RiskTarget::Var(v)) if v > 0.0 => {
            scale_to_var(weights, returns, v, confidence, caps.var)
        }
        _ => weights.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use ndarray::array;

    fn returns(values: Vec<f64>) -> ReturnMatrix {
        let n = values.len() / 2;
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let matrix = Array2::from_shape_vec((n, 2), values).unwrap();
        ReturnMatrix::new(dates, vec!["A".into(), "B".into()], matrix).unwrap()
    }

    #[test]
    fn volatility_target_is_hit_below_cap() {
        let cov = array![[0.0001, 0.00002], [0.00002, 0.0002]];
        let w = array![0.5, 0.5];
        let before = annualized_volatility(&w, &cov);
        let scaled = scale_to_volatility(&w, &cov, 0.20, 3.0);

        assert_abs_diff_eq!(annualized_volatility(&scaled, &cov), 0.20, epsilon = 1e-12);
        let leverage = 0.20 / before;
        assert!(leverage < 3.0);
        for i in 0..2 {
            assert_abs_diff_eq!(scaled[i], w[i] * leverage, epsilon = 1e-12);
        }
    }

    #[test]
    fn volatility_leverage_is_capped() {
        let cov = array![[0.00001, 0.0], [0.0, 0.00001]];
        let w = array![0.5, 0.5];
        let scaled = scale_to_volatility(&w, &cov, 1.0, 3.0);
        assert_abs_diff_eq!(scaled[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(scaled.sum(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_volatility_is_a_no_op() {
        let cov = Array2::zeros((2, 2));
        let w = array![0.3, 0.7];
        assert_eq!(scale_to_volatility(&w, &cov, 0.1, 3.0), w);
    }

    #[test]
    fn var_target_scales_linearly() {
        let rets = returns(
            (0..200)
                .flat_map(|i| {
                    let r = ((i % 20) as f64 - 10.0) / 1000.0;
                    [r, r * 0.5]
                })
                .collect(),
        );
        let w = array![0.5, 0.5];
        let current = historical_var(&w, &rets, 0.95);
        let scaled = scale_to_var(&w, &rets, current * 2.0, 0.95, 4.0);
        assert_abs_diff_eq!(scaled[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            historical_var(&scaled, &rets, 0.95),
            current * 2.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn var_leverage_is_capped() {
        let rets = returns(vec![-0.001, -0.001, 0.001, 0.001, -0.002, 0.0, 0.003, 0.001]);
        let w = array![0.5, 0.5];
        let scaled = scale_to_var(&w, &rets, 50.0, 0.95, 4.0);
        assert_abs_diff_eq!(scaled.sum(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn apply_target_none_returns_input() {
        let cov = array![[0.0001, 0.0], [0.0, 0.0001]];
        let rets = returns(vec![0.01, 0.0, -0.01, 0.0]);
        let w = array![0.4, 0.6];
        let out = apply_target(&w, None, &cov, &rets, 0.95, &LeverageCaps::default());
        assert_eq!(out, w);
    }
}
