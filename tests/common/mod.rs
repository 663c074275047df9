#![allow(dead_code)]

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use regimefolio::cli::RunConfig;
use regimefolio::domain::error::AllocatorError;
use regimefolio::domain::regime::OptimizerSettings;
pub use regimefolio::domain::prices::{ClosePoint, PriceMatrix};
use regimefolio::ports::price_port::PricePort;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<ClosePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_closes(mut self, ticker: &str, closes: Vec<ClosePoint>) -> Self {
        self.data.insert(ticker.to_string(), closes);
        self
    }

    pub fn with_series(mut self, series: Vec<(String, Vec<ClosePoint>)>) -> Self {
        for (ticker, closes) in series {
            self.data.insert(ticker, closes);
        }
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_closes(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ClosePoint>, AllocatorError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(AllocatorError::Data {
                reason: reason.clone(),
            });
        }
        let closes = self.data.get(ticker).ok_or_else(|| AllocatorError::NoData {
            ticker: ticker.to_string(),
        })?;
        Ok(closes
            .iter()
            .filter(|p| start.is_none_or(|s| p.date >= s) && end.is_none_or(|e| p.date <= e))
            .copied()
            .collect())
    }

    fn data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocatorError> {
        let closes = self.fetch_closes(ticker, None, None)?;
        Ok(match (closes.first(), closes.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, closes.len())),
            _ => None,
        })
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `n` consecutive weekdays starting on or after `start`.
pub fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

/// Daily drift and volatility of one synthetic asset.
#[derive(Debug, Clone, Copy)]
pub struct AssetProfile {
    pub drift: f64,
    pub vol: f64,
}

pub const EQUITY: AssetProfile = AssetProfile {
    drift: 0.0006,
    vol: 0.012,
};
pub const BOND: AssetProfile = AssetProfile {
    drift: 0.0001,
    vol: 0.004,
};
pub const GOLD: AssetProfile = AssetProfile {
    drift: 0.0003,
    vol: 0.009,
};

fn cholesky(corr: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = corr.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                l[i][j] = (corr[i][i] - s).sqrt();
            } else {
                l[i][j] = (corr[i][j] - s) / l[j][j];
            }
        }
    }
    l
}

/// Correlated geometric random walks starting at 100, one Vec per asset.
pub fn correlated_closes(
    seed: u64,
    days: usize,
    profiles: &[AssetProfile],
    correlation: &[Vec<f64>],
) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let l = cholesky(correlation);
    let n = profiles.len();

    let mut levels = vec![100.0; n];
    let mut out = vec![Vec::with_capacity(days); n];
    for _ in 0..days {
        let z: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
        for i in 0..n {
            let shock: f64 = (0..=i).map(|k| l[i][k] * z[k]).sum();
            levels[i] *= 1.0 + profiles[i].drift + profiles[i].vol * shock;
            out[i].push(levels[i]);
        }
    }
    out
}

pub fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

pub fn synthetic_series(
    tickers: &[&str],
    seed: u64,
    days: usize,
    profiles: &[AssetProfile],
    correlation: &[Vec<f64>],
) -> Vec<(String, Vec<ClosePoint>)> {
    let dates = business_days(date(2021, 1, 4), days);
    correlated_closes(seed, days, profiles, correlation)
        .into_iter()
        .zip(tickers)
        .map(|(closes, ticker)| {
            let points = dates
                .iter()
                .zip(closes)
                .map(|(&date, close)| ClosePoint { date, close })
                .collect();
            (ticker.to_string(), points)
        })
        .collect()
}

pub fn synthetic_prices(
    tickers: &[&str],
    seed: u64,
    days: usize,
    profiles: &[AssetProfile],
    correlation: &[Vec<f64>],
) -> PriceMatrix {
    PriceMatrix::align(&synthetic_series(tickers, seed, days, profiles, correlation)).unwrap()
}

/// Three assets with distinct risk/return profiles and mild correlation.
pub fn three_asset_prices(seed: u64, days: usize) -> PriceMatrix {
    let corr = vec![
        vec![1.0, -0.2, 0.1],
        vec![-0.2, 1.0, 0.2],
        vec![0.1, 0.2, 1.0],
    ];
    synthetic_prices(&["EQ", "BD", "GD"], seed, days, &[EQUITY, BOND, GOLD], &corr)
}

/// A run over `tickers` with default optimizer settings and a small frontier.
pub fn sample_run_config(tickers: &[&str]) -> RunConfig {
    RunConfig {
        data_dir: PathBuf::from("data"),
        start_date: None,
        end_date: None,
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        settings: OptimizerSettings::default(),
        benchmarks: true,
        output: PathBuf::from("allocation.json"),
        frontier_samples: 50,
        recent_rows: 5,
    }
}
