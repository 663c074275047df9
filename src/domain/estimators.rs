//! Statistical estimators over a return matrix.
//!
//! - [`shrunk_covariance`]: Ledoit-Wolf linear shrinkage toward a scaled
//!   identity, intensity chosen analytically.
//! - [`ewma_means`]: adjusted exponentially weighted mean, last value per asset.
//! - [`sample_covariance`]: unbiased sample covariance (benchmarks only).
//! - [`correlation`]: covariance rescaled by the outer product of std devs.

use crate::domain::prices::ReturnMatrix;
use ndarray::{Array1, Array2, Axis};

/// A shrunk covariance estimate and the intensity used to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct ShrunkCovariance {
    pub covariance: Array2<f64>,
    /// Weight of the structured target, in [0, 1].
    pub shrinkage: f64,
}

/// Ledoit-Wolf shrinkage covariance.
///
/// Returns are centered; the sample covariance uses the biased `1/T`
/// normalisation. The target is `mu * I` with `mu = trace(S) / n`. The
/// result is a convex combination of two PSD matrices and so stays PSD
/// even when `T <= n`.
pub fn shrunk_covariance(returns: &ReturnMatrix) -> ShrunkCovariance {
    let x = returns.values();
    let (t, n) = x.dim();
    if t == 0 || n == 0 {
        return ShrunkCovariance {
            covariance: Array2::zeros((n, n)),
            shrinkage: 0.0,
        };
    }

    let means = returns.column_means();
    let centered = x - &means.insert_axis(Axis(0));
    let t_f = t as f64;
    let n_f = n as f64;

    let sample = centered.t().dot(&centered) / t_f;
    if n == 1 {
        return ShrunkCovariance {
            covariance: sample,
            shrinkage: 0.0,
        };
    }

    let squared = centered.mapv(|v| v * v);
    let variances = squared.sum_axis(Axis(0)) / t_f;
    let mu = variances.sum() / n_f;

    let delta_raw = centered.t().dot(&centered).mapv(|v| v * v).sum() / (t_f * t_f);
    let beta_raw = squared.t().dot(&squared).sum();

    let beta = (beta_raw / t_f - delta_raw) / (n_f * t_f);
    let delta = (delta_raw - 2.0 * mu * variances.sum() + n_f * mu * mu) / n_f;
    let beta = beta.min(delta);

    let shrinkage = if beta <= 0.0 || delta <= 0.0 {
        0.0
    } else {
        (beta / delta).clamp(0.0, 1.0)
    };

    let target = Array2::<f64>::eye(n) * mu;
    let covariance = &sample * (1.0 - shrinkage) + &target * shrinkage;

    ShrunkCovariance {
        covariance,
        shrinkage,
    }
}

/// Last value of the bias-adjusted EWMA of each column, `alpha = 2/(span+1)`.
///
/// `ewma_t = sum_i (1-alpha)^i x_{t-i} / sum_i (1-alpha)^i`
pub fn ewma_means(returns: &ReturnMatrix, span: usize) -> Array1<f64> {
    let x = returns.values();
    let (t, n) = x.dim();
    let mut out = Array1::zeros(n);
    if t == 0 {
        return out;
    }

    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut weight = 1.0;
    let mut weight_sum = 0.0;
    for row in x.outer_iter().rev() {
        out.scaled_add(weight, &row);
        weight_sum += weight;
        weight *= decay;
    }
    out / weight_sum
}

/// Unbiased (`1/(T-1)`) sample covariance.
pub fn sample_covariance(returns: &ReturnMatrix) -> Array2<f64> {
    let x = returns.values();
    let (t, n) = x.dim();
    if t < 2 {
        return Array2::zeros((n, n));
    }
    let means = returns.column_means();
    let centered = x - &means.insert_axis(Axis(0));
    centered.t().dot(&centered) / (t as f64 - 1.0)
}

/// Correlation matrix, clipped to [-1, 1]. Assets with zero variance get a
/// zero row/column with a unit diagonal.
pub fn correlation(covariance: &Array2<f64>) -> Array2<f64> {
    let n = covariance.nrows();
    let std_devs: Array1<f64> = covariance.diag().mapv(|v| v.max(0.0).sqrt());
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = std_devs[i] * std_devs[j];
        if denom > 0.0 {
            (covariance[[i, j]] / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    })
}
