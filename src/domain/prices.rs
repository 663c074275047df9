//! Price and return matrices.
//!
//! A [`PriceMatrix`] holds one close series per ticker aligned on a shared,
//! strictly ascending date index. [`ReturnMatrix`] holds the daily simple
//! returns derived from it and is never persisted.

use crate::domain::error::AllocatorError;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, Axis, s};
use std::collections::{BTreeMap, BTreeSet};

/// A single dated close, as delivered by a [`crate::ports::price_port::PricePort`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl PriceMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, AllocatorError> {
        let (rows, cols) = values.dim();
        if rows != dates.len() || cols != tickers.len() {
            return Err(AllocatorError::InvalidInput {
                reason: format!(
                    "price matrix is {}x{} but has {} dates and {} tickers",
                    rows,
                    cols,
                    dates.len(),
                    tickers.len()
                ),
            });
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AllocatorError::InvalidInput {
                reason: "price dates must be strictly ascending".into(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AllocatorError::InvalidInput {
                reason: "price matrix contains missing or non-finite values".into(),
            });
        }
        Ok(Self {
            dates,
            tickers,
            values,
        })
    }

    /// Aligns per-ticker close series on the dates every ticker has a close for.
    pub fn align(series: &[(String, Vec<ClosePoint>)]) -> Result<Self, AllocatorError> {
        let lookups: Vec<BTreeMap<NaiveDate, f64>> = series
            .iter()
            .map(|(_, points)| points.iter().map(|p| (p.date, p.close)).collect())
            .collect();

        let mut common: Option<BTreeSet<NaiveDate>> = None;
        for lookup in &lookups {
            let dates: BTreeSet<NaiveDate> = lookup.keys().copied().collect();
            common = Some(match common {
                None => dates,
                Some(acc) => acc.intersection(&dates).copied().collect(),
            });
        }
        let dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();

        let mut values = Array2::zeros((dates.len(), series.len()));
        for (col, lookup) in lookups.iter().enumerate() {
            for (row, date) in dates.iter().enumerate() {
                values[[row, col]] = lookup[date];
            }
        }

        let tickers = series.iter().map(|(t, _)| t.clone()).collect();
        Self::new(dates, tickers, values)
    }

    /// Re-indexes close series onto `dates`, carrying the last known close
    /// forward. Dates before a series' first close stay missing and those rows
    /// are dropped, so the result may be shorter than `dates`.
    pub fn reindex_forward_filled(
        dates: &[NaiveDate],
        series: &[(String, Vec<ClosePoint>)],
    ) -> Result<Self, AllocatorError> {
        let mut columns: Vec<Vec<Option<f64>>> = Vec::with_capacity(series.len());
        for (_, points) in series {
            let lookup: BTreeMap<NaiveDate, f64> =
                points.iter().map(|p| (p.date, p.close)).collect();
            let mut last = None;
            let column = dates
                .iter()
                .map(|d| {
                    if let Some(&close) = lookup.get(d) {
                        last = Some(close);
                    }
                    last
                })
                .collect();
            columns.push(column);
        }

        let keep: Vec<usize> = (0..dates.len())
            .filter(|&row| columns.iter().all(|c| c[row].is_some()))
            .collect();

        let mut values = Array2::zeros((keep.len(), series.len()));
        for (col, column) in columns.iter().enumerate() {
            for (out_row, &row) in keep.iter().enumerate() {
                values[[out_row, col]] = column[row].unwrap_or_default();
            }
        }

        let kept_dates = keep.iter().map(|&row| dates[row]).collect();
        let tickers = series.iter().map(|(t, _)| t.clone()).collect();
        Self::new(kept_dates, tickers, values)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn asset_count(&self) -> usize {
        self.tickers.len()
    }

    /// The most recent `rows` rows (or all rows if fewer exist).
    pub fn tail(&self, rows: usize) -> PriceMatrix {
        let start = self.row_count().saturating_sub(rows);
        PriceMatrix {
            dates: self.dates[start..].to_vec(),
            tickers: self.tickers.clone(),
            values: self.values.slice(s![start.., ..]).to_owned(),
        }
    }

    /// Daily simple percentage changes; one fewer row than the prices.
    pub fn returns(&self) -> ReturnMatrix {
        let rows = self.row_count();
        if rows < 2 {
            return ReturnMatrix {
                dates: Vec::new(),
                tickers: self.tickers.clone(),
                values: Array2::zeros((0, self.asset_count())),
            };
        }
        let prev = self.values.slice(s![..rows - 1, ..]);
        let curr = self.values.slice(s![1.., ..]);
        let values = &curr / &prev - 1.0;
        ReturnMatrix {
            dates: self.dates[1..].to_vec(),
            tickers: self.tickers.clone(),
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    values: Array2<f64>,
}

impl ReturnMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self, AllocatorError> {
        let (rows, cols) = values.dim();
        if rows != dates.len() || cols != tickers.len() {
            return Err(AllocatorError::InvalidInput {
                reason: format!(
                    "return matrix is {}x{} but has {} dates and {} tickers",
                    rows,
                    cols,
                    dates.len(),
                    tickers.len()
                ),
            });
        }
        Ok(Self {
            dates,
            tickers,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn asset_count(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.column(index)
    }

    /// Daily portfolio returns `R · w`.
    pub fn portfolio_returns(&self, weights: &Array1<f64>) -> Array1<f64> {
        self.values.dot(weights)
    }

    /// Plain arithmetic mean of each column.
    pub fn column_means(&self) -> Array1<f64> {
        self.values
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.asset_count()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn points(values: &[(u32, f64)]) -> Vec<ClosePoint> {
        values
            .iter()
            .map(|&(d, close)| ClosePoint {
                date: date(d),
                close,
            })
            .collect()
    }

    #[test]
    fn new_rejects_shape_mismatch() {
        let result = PriceMatrix::new(
            vec![date(1), date(2)],
            vec!["A".into()],
            array![[1.0, 2.0], [3.0, 4.0]],
        );
        assert!(matches!(result, Err(AllocatorError::InvalidInput { .. })));
    }

    #[test]
    fn new_rejects_unsorted_dates() {
        let result = PriceMatrix::new(
            vec![date(2), date(1)],
            vec!["A".into()],
            array![[1.0], [2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_nan() {
        let result = PriceMatrix::new(
            vec![date(1), date(2)],
            vec!["A".into()],
            array![[1.0], [f64::NAN]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn align_keeps_common_dates_only() {
        let series = vec![
            ("A".to_string(), points(&[(1, 10.0), (2, 11.0), (3, 12.0)])),
            ("B".to_string(), points(&[(2, 20.0), (3, 21.0), (4, 22.0)])),
        ];
        let prices = PriceMatrix::align(&series).unwrap();

        assert_eq!(prices.dates(), &[date(2), date(3)]);
        assert_eq!(prices.tickers(), &["A".to_string(), "B".to_string()]);
        assert_eq!(prices.values(), &array![[11.0, 20.0], [12.0, 21.0]]);
    }

    #[test]
    fn reindex_forward_fills_gaps_and_drops_leading_rows() {
        let dates = vec![date(1), date(2), date(3), date(4)];
        let series = vec![
            ("X".to_string(), points(&[(1, 5.0), (3, 6.0)])),
            ("Y".to_string(), points(&[(2, 7.0), (4, 8.0)])),
        ];
        let prices = PriceMatrix::reindex_forward_filled(&dates, &series).unwrap();

        assert_eq!(prices.dates(), &[date(2), date(3), date(4)]);
        assert_eq!(
            prices.values(),
            &array![[5.0, 7.0], [6.0, 7.0], [6.0, 8.0]]
        );
    }

    #[test]
    fn returns_are_simple_percentage_changes() {
        let prices = PriceMatrix::new(
            vec![date(1), date(2), date(3)],
            vec!["A".into(), "B".into()],
            array![[100.0, 50.0], [110.0, 45.0], [99.0, 45.0]],
        )
        .unwrap();
        let rets = prices.returns();

        assert_eq!(rets.row_count(), 2);
        assert_eq!(rets.dates(), &[date(2), date(3)]);
        assert_abs_diff_eq!(rets.values()[[0, 0]], 0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(rets.values()[[0, 1]], -0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(rets.values()[[1, 0]], -0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(rets.values()[[1, 1]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn tail_slices_most_recent_rows() {
        let prices = PriceMatrix::new(
            vec![date(1), date(2), date(3)],
            vec!["A".into()],
            array![[1.0], [2.0], [3.0]],
        )
        .unwrap();
        let tail = prices.tail(2);
        assert_eq!(tail.dates(), &[date(2), date(3)]);
        assert_eq!(tail.values(), &array![[2.0], [3.0]]);

        assert_eq!(prices.tail(10).row_count(), 3);
    }

    #[test]
    fn single_row_has_empty_returns() {
        let prices =
            PriceMatrix::new(vec![date(1)], vec!["A".into()], array![[1.0]]).unwrap();
        assert!(prices.returns().is_empty());
    }

    #[test]
    fn portfolio_returns_is_weighted_sum() {
        let rets = ReturnMatrix::new(
            vec![date(1), date(2)],
            vec!["A".into(), "B".into()],
            array![[0.01, 0.03], [-0.02, 0.0]],
        )
        .unwrap();
        let port = rets.portfolio_returns(&array![0.5, 0.5]);
        assert_abs_diff_eq!(port[0], 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(port[1], -0.01, epsilon = 1e-12);
    }
}
