//! Fixed reference portfolios evaluated on the same dates as the allocation.
//!
//! Benchmarks use the plain arithmetic mean and the unbiased sample
//! covariance rather than the shrunk estimators.

use crate::domain::estimators::sample_covariance;
use crate::domain::history::PerformanceCurves;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::prices::{ClosePoint, PriceMatrix};
use crate::domain::risk::RiskDecomposition;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use ndarray::Array1;
use std::time::Instant;
use tracing::{debug, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkDefinition {
    pub name: &'static str,
    pub allocation: &'static [(&'static str, f64)],
}

pub const SIXTY_FORTY: BenchmarkDefinition = BenchmarkDefinition {
    name: "60/40",
    allocation: &[("SPY", 0.6), ("BND", 0.4)],
};

pub const PERMANENT: BenchmarkDefinition = BenchmarkDefinition {
    name: "Permanent",
    allocation: &[("SPY", 0.25), ("TLT", 0.25), ("GLD", 0.25), ("SHY", 0.25)],
};

pub const BENCHMARKS: [BenchmarkDefinition; 2] = [SIXTY_FORTY, PERMANENT];

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub name: String,
    /// Target allocation as defined, before any missing constituent is dropped.
    pub allocation: Vec<(String, f64)>,
    /// Effective weights over `tickers`, renormalized to sum to 1.
    pub weights: Array1<f64>,
    pub tickers: Vec<String>,
    pub metrics: PortfolioMetrics,
    pub curves: PerformanceCurves,
    pub risk: RiskDecomposition,
}

/// Every constituent ticker across `definitions`, first appearance first.
pub fn constituents(definitions: &[BenchmarkDefinition]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for def in definitions {
        for &(ticker, _) in def.allocation {
            if !out.contains(&ticker) {
                out.push(ticker);
            }
        }
    }
    out
}

/// Loads constituent closes and re-indexes them onto `dates` with forward
/// fill. Constituents that fail to load are skipped.
pub fn load_prices(
    port: &dyn PricePort,
    tickers: &[&str],
    dates: &[NaiveDate],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Option<PriceMatrix> {
    let mut series: Vec<(String, Vec<ClosePoint>)> = Vec::new();
    for &ticker in tickers {
        match port.fetch_closes(ticker, start, end) {
            Ok(points) if !points.is_empty() => series.push((ticker.to_string(), points)),
            Ok(_) => warn!(ticker, "skipping benchmark constituent (no data)"),
            Err(e) => warn!(ticker, error = %e, "skipping benchmark constituent"),
        }
    }
    if series.is_empty() {
        return None;
    }
    match PriceMatrix::reindex_forward_filled(dates, &series) {
        Ok(prices) if prices.row_count() > 0 => Some(prices),
        Ok(_) => {
            warn!("benchmark prices have no rows after alignment");
            None
        }
        Err(e) => {
            warn!(error = %e, "benchmark prices could not be aligned");
            None
        }
    }
}

/// Evaluates one benchmark on already aligned constituent prices. Returns
/// `None` when none of its constituents are present or there is too little
/// history for a sample covariance.
pub fn evaluate(
    definition: &BenchmarkDefinition,
    prices: &PriceMatrix,
    risk_free_rate: f64,
    var_confidence: f64,
) -> Option<BenchmarkResult> {
    let returns = prices.returns();
    if returns.row_count() < 2 {
        return None;
    }
    let tickers = prices.tickers();

    let mut weights = Array1::<f64>::zeros(tickers.len());
    for &(ticker, weight) in definition.allocation {
        match tickers.iter().position(|t| t == ticker) {
            Some(col) => weights[col] += weight,
            None => warn!(benchmark = definition.name, ticker, "constituent missing"),
        }
    }
    let total = weights.sum();
    if total <= 0.0 {
        warn!(benchmark = definition.name, "no constituents available, omitting");
        return None;
    }
    weights /= total;

    let mean = returns.column_means();
    let covariance = sample_covariance(&returns);
    let metrics = PortfolioMetrics::compute(
        &weights,
        &mean,
        &covariance,
        &returns,
        risk_free_rate,
        var_confidence,
    );

    Some(BenchmarkResult {
        name: definition.name.to_string(),
        allocation: definition
            .allocation
            .iter()
            .map(|(t, w)| (t.to_string(), *w))
            .collect(),
        curves: PerformanceCurves::compute(&weights, &returns),
        risk: RiskDecomposition::compute(tickers, &weights, &covariance),
        tickers: tickers.to_vec(),
        weights,
        metrics,
    })
}

/// Loads and evaluates every standard benchmark over `dates`.
pub fn run(
    port: &dyn PricePort,
    dates: &[NaiveDate],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    risk_free_rate: f64,
    var_confidence: f64,
) -> Vec<BenchmarkResult> {
    let span = info_span!("benchmarks");
    let _enter = span.enter();
    let started = Instant::now();

    let tickers = constituents(&BENCHMARKS);
    let Some(prices) = load_prices(port, &tickers, dates, start, end) else {
        warn!("no benchmark data available");
        return Vec::new();
    };

    let results: Vec<BenchmarkResult> = BENCHMARKS
        .iter()
        .filter_map(|def| evaluate(def, &prices, risk_free_rate, var_confidence))
        .collect();
    debug!(
        count = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "benchmarks computed"
    );
    results
}
