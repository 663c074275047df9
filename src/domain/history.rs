//! Growth-of-100 history and drawdown curves.

use crate::domain::prices::ReturnMatrix;
use chrono::{Duration, NaiveDate};
use ndarray::Array1;
use serde::Serialize;

pub const HISTORY_BASE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PerformanceCurves {
    /// Portfolio value, anchored at 100 the day before the first return.
    pub history: Vec<CurvePoint>,
    /// Percentage below the running peak, anchored at 0.
    pub drawdowns: Vec<CurvePoint>,
}

impl PerformanceCurves {
    pub fn compute(weights: &Array1<f64>, returns: &ReturnMatrix) -> Self {
        let Some(&first) = returns.dates().first() else {
            return Self::default();
        };
        let anchor = first - Duration::days(1);
        let daily = returns.portfolio_returns(weights);

        let mut history = Vec::with_capacity(daily.len() + 1);
        let mut drawdowns = Vec::with_capacity(daily.len() + 1);
        history.push(CurvePoint {
            date: anchor,
            value: HISTORY_BASE,
        });
        drawdowns.push(CurvePoint {
            date: anchor,
            value: 0.0,
        });

        let mut cumulative = 1.0;
        let mut peak = f64::NEG_INFINITY;
        for (&date, &r) in returns.dates().iter().zip(daily.iter()) {
            cumulative *= 1.0 + r;
            peak = peak.max(cumulative);
            history.push(CurvePoint {
                date,
                value: cumulative * HISTORY_BASE,
            });
            let drawdown = if peak > 0.0 {
                (cumulative / peak - 1.0) * 100.0
            } else {
                0.0
            };
            drawdowns.push(CurvePoint {
                date,
                value: drawdown,
            });
        }

        PerformanceCurves { history, drawdowns }
    }

    /// Largest peak-to-trough decline, as a positive percentage.
    pub fn max_drawdown(&self) -> f64 {
        self.drawdowns
            .iter()
            .map(|p| -p.value)
            .fold(0.0_f64, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn returns(values: &[f64]) -> ReturnMatrix {
        let dates = (0..values.len()).map(|i| date(i as u32 + 4)).collect();
        let matrix = Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap();
        ReturnMatrix::new(dates, vec!["A".into()], matrix).unwrap()
    }

    #[test]
    fn curves_anchor_the_day_before_first_return() {
        let curves = PerformanceCurves::compute(&array![1.0], &returns(&[0.01, -0.02]));

        assert_eq!(curves.history[0].date, date(3));
        assert_eq!(curves.history[0].value, 100.0);
        assert_eq!(curves.drawdowns[0].date, date(3));
        assert_eq!(curves.drawdowns[0].value, 0.0);
        assert_eq!(curves.history.len(), 3);
    }

    #[test]
    fn history_compounds_returns() {
        let curves = PerformanceCurves::compute(&array![1.0], &returns(&[0.10, -0.10]));
        assert_abs_diff_eq!(curves.history[1].value, 110.0, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.history[2].value, 99.0, epsilon = 1e-9);
    }

    #[test]
    fn drawdown_tracks_running_peak() {
        let curves =
            PerformanceCurves::compute(&array![1.0], &returns(&[0.10, -0.10, 0.05, 0.20]));
        assert_abs_diff_eq!(curves.drawdowns[1].value, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.drawdowns[2].value, -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.drawdowns[3].value, -5.5, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.drawdowns[4].value, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.max_drawdown(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn first_day_loss_is_not_a_drawdown_from_the_anchor() {
        let curves = PerformanceCurves::compute(&array![1.0], &returns(&[-0.05, -0.05]));
        assert_abs_diff_eq!(curves.drawdowns[1].value, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(curves.drawdowns[2].value, -5.0, epsilon = 1e-9);
    }

    #[test]
    fn dates_strictly_increase() {
        let curves = PerformanceCurves::compute(&array![1.0], &returns(&[0.01, 0.02, 0.03]));
        assert!(curves.history.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn empty_returns_give_empty_curves() {
        let rets = ReturnMatrix::new(vec![], vec!["A".into()], Array2::zeros((0, 1))).unwrap();
        let curves = PerformanceCurves::compute(&array![1.0], &rets);
        assert!(curves.history.is_empty());
    }
}
