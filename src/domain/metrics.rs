//! Portfolio performance metrics and historical VaR.

use crate::domain::prices::ReturnMatrix;
use ndarray::{Array1, Array2};
use serde::Serialize;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annualized volatility floor used as the Sharpe denominator.
pub const MIN_EFFECTIVE_VOL: f64 = 0.05;

pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

/// Annualized return, volatility and Sharpe ratio of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskReturn {
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
}

impl RiskReturn {
    /// `return = 252 (mu . w)`, `vol = sqrt(252) sqrt(w' S w)`,
    /// `sharpe = (return - rf) / max(vol, 0.05)`.
    pub fn compute(
        weights: &Array1<f64>,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        risk_free_rate: f64,
    ) -> Self {
        let annual_return = mean.dot(weights) * TRADING_DAYS_PER_YEAR;
        let annual_volatility = annualized_volatility(weights, covariance);
        let effective_vol = annual_volatility.max(MIN_EFFECTIVE_VOL);
        let sharpe_ratio = (annual_return - risk_free_rate) / effective_vol;
        RiskReturn {
            annual_return,
            annual_volatility,
            sharpe_ratio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub sharpe_ratio: f64,
    /// One-day historical VaR as a positive percentage (2.5 = 2.5% loss).
    pub var_pct: f64,
}

impl PortfolioMetrics {
    pub fn compute(
        weights: &Array1<f64>,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        returns: &ReturnMatrix,
        risk_free_rate: f64,
        var_confidence: f64,
    ) -> Self {
        let rr = RiskReturn::compute(weights, mean, covariance, risk_free_rate);
        PortfolioMetrics {
            annual_return: rr.annual_return,
            annual_volatility: rr.annual_volatility,
            sharpe_ratio: rr.sharpe_ratio,
            var_pct: historical_var(weights, returns, var_confidence),
        }
    }
}

/// `w' S w`, clamped at zero against rounding.
pub fn portfolio_variance(weights: &Array1<f64>, covariance: &Array2<f64>) -> f64 {
    weights.dot(&covariance.dot(weights)).max(0.0)
}

pub fn annualized_volatility(weights: &Array1<f64>, covariance: &Array2<f64>) -> f64 {
    portfolio_variance(weights, covariance).sqrt() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Percentile with linear interpolation between closest ranks
/// (`q` in [0, 100]). Returns 0 for an empty input.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// One-day VaR of a daily return series at `confidence`, as a positive percentage.
pub fn series_var(daily_returns: &[f64], confidence: f64) -> f64 {
    let cutoff = (1.0 - confidence) * 100.0;
    percentile(daily_returns, cutoff).abs() * 100.0
}

/// Historical VaR of the portfolio `returns · weights`.
pub fn historical_var(weights: &Array1<f64>, returns: &ReturnMatrix, confidence: f64) -> f64 {
    let daily = returns.portfolio_returns(weights);
    series_var(&daily.to_vec(), confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;
    use ndarray::array;

    fn single_asset_returns(values: &[f64]) -> ReturnMatrix {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        let matrix = Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap();
        ReturnMatrix::new(dates, vec!["A".into()], matrix).unwrap()
    }

    #[test]
    fn risk_return_annualizes() {
        let w = array![0.5, 0.5];
        let mean = array![0.001, 0.0005];
        let cov = array![[0.0001, 0.0], [0.0, 0.0004]];
        let rr = RiskReturn::compute(&w, &mean, &cov, 0.0);

        assert_abs_diff_eq!(rr.annual_return, 0.00075 * 252.0, epsilon = 1e-12);
        let var: f64 = 0.25 * 0.0001 + 0.25 * 0.0004;
        assert_abs_diff_eq!(
            rr.annual_volatility,
            var.sqrt() * 252.0_f64.sqrt(),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            rr.sharpe_ratio,
            rr.annual_return / rr.annual_volatility,
            epsilon = 1e-12
        );
    }

    #[test]
    fn sharpe_uses_volatility_floor() {
        let w = array![1.0];
        let mean = array![0.0004];
        let cov = array![[1e-8]];
        let rr = RiskReturn::compute(&w, &mean, &cov, 0.02);
        assert!(rr.annual_volatility < MIN_EFFECTIVE_VOL);
        assert_abs_diff_eq!(
            rr.sharpe_ratio,
            (0.0004 * 252.0 - 0.02) / MIN_EFFECTIVE_VOL,
            epsilon = 1e-12
        );
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_abs_diff_eq!(percentile(&values, 0.0), 1.0);
        assert_abs_diff_eq!(percentile(&values, 100.0), 5.0);
        assert_abs_diff_eq!(percentile(&values, 50.0), 3.0);
        assert_abs_diff_eq!(percentile(&values, 5.0), 1.2, epsilon = 1e-12);
    }

    #[test]
    fn var_is_positive_percentage() {
        let mut values: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 2000.0).collect();
        values.reverse();
        let rets = single_asset_returns(&values);
        let var = historical_var(&array![1.0], &rets, 0.95);
        let expected = percentile(&values, 5.0).abs() * 100.0;
        assert!(var > 0.0);
        assert_abs_diff_eq!(var, expected, epsilon = 1e-12);
    }

    #[test]
    fn var_grows_with_fatter_left_tail() {
        let base: Vec<f64> = (0..200).map(|i| ((i % 21) as f64 - 10.0) / 1000.0).collect();
        let mut fat = base.clone();
        for v in fat.iter_mut().filter(|v| **v < -0.007) {
            *v *= 3.0;
        }
        let thin = historical_var(&array![1.0], &single_asset_returns(&base), 0.95);
        let thick = historical_var(&array![1.0], &single_asset_returns(&fat), 0.95);
        assert!(thick > thin);
    }

    #[test]
    fn empty_series_has_zero_var() {
        assert_eq!(series_var(&[], 0.95), 0.0);
    }
}
