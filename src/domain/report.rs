//! Presentation view of an allocation run.
//!
//! This is the only place percentages are rounded. Everything upstream keeps
//! full precision.

use crate::domain::benchmark::BenchmarkResult;
use crate::domain::frontier::FrontierPoint;
use crate::domain::history::CurvePoint;
use crate::domain::hrp::LinkageRow;
use crate::domain::leverage::RiskTarget;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::prices::PriceMatrix;
use crate::domain::risk::RiskDecomposition;
use crate::domain::solver::SolveStatus;
use crate::domain::strategy::OptimizationResult;
use crate::domain::universe::SkippedTicker;
use chrono::NaiveDate;
use ndarray::Array2;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_RECENT_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationReport {
    pub status: &'static str,
    pub meta: ReportMeta,
    pub recent_prices: Vec<RecentPrices>,
    /// Display name, then mode, e.g. `strategies["Max Sharpe"]["constrained"]`.
    pub strategies: BTreeMap<&'static str, BTreeMap<&'static str, StrategyView>>,
    pub benchmarks: BTreeMap<String, BenchmarkView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    pub lookback: usize,
    pub shrinkage: f64,
    pub risk_free_rate: f64,
    pub target: Option<RiskTarget>,
    pub diagnostics: Diagnostics,
    pub dendrogram: DendrogramView,
    pub frontier: Vec<FrontierView>,
    /// Requested tickers left out of the run.
    pub skipped: Vec<SkippedView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedView {
    pub ticker: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub correlation: CorrelationView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationView {
    pub tickers: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DendrogramView {
    /// Leaf ids in `linkage` index into `labels`.
    pub linkage: Vec<LinkageRow>,
    /// Tickers in asset column order.
    pub labels: Vec<String>,
    /// Tickers in quasi-diagonal order.
    pub leaf_order: Vec<String>,
}

/// Scatter point: `x` is volatility %, `y` is return %.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrontierView {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPrices {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub closes: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsView {
    #[serde(rename = "return")]
    pub annual_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub var: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskView {
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    pub risk_contribution: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyView {
    pub allocation: BTreeMap<String, f64>,
    pub metrics: MetricsView,
    pub status: SolveStatus,
    pub history: Vec<CurvePoint>,
    pub drawdowns: Vec<CurvePoint>,
    pub risk_decomposition: RiskView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkView {
    pub allocation: BTreeMap<String, f64>,
    pub metrics: MetricsView,
    pub history: Vec<CurvePoint>,
    pub drawdowns: Vec<CurvePoint>,
    pub risk_decomposition: RiskView,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn pct(value: f64, places: i32) -> f64 {
    round_to(value * 100.0, places)
}

impl MetricsView {
    pub fn from_metrics(m: &PortfolioMetrics) -> Self {
        MetricsView {
            annual_return: pct(m.annual_return, 1),
            volatility: pct(m.annual_volatility, 1),
            sharpe: round_to(m.sharpe_ratio, 2),
            var: round_to(m.var_pct, 2),
        }
    }
}

impl RiskView {
    pub fn from_decomposition(risk: &RiskDecomposition) -> Self {
        RiskView {
            tickers: risk.shares.iter().map(|s| s.ticker.clone()).collect(),
            weights: risk.shares.iter().map(|s| pct(s.weight, 1)).collect(),
            risk_contribution: risk.shares.iter().map(|s| pct(s.contribution, 1)).collect(),
        }
    }
}

fn round_curve(points: &[CurvePoint]) -> Vec<CurvePoint> {
    points
        .iter()
        .map(|p| CurvePoint {
            date: p.date,
            value: round_to(p.value, 2),
        })
        .collect()
}

fn round_matrix(m: &Array2<f64>, places: i32) -> Vec<Vec<f64>> {
    m.rows()
        .into_iter()
        .map(|row| row.iter().map(|v| round_to(*v, places)).collect())
        .collect()
}

/// The last `rows` price rows, newest first, rounded to cents.
pub fn recent_prices(prices: &PriceMatrix, rows: usize) -> Vec<RecentPrices> {
    let tail = prices.tail(rows);
    tail.dates()
        .iter()
        .zip(tail.values().rows())
        .rev()
        .map(|(&date, row)| RecentPrices {
            date,
            closes: tail
                .tickers()
                .iter()
                .zip(row.iter())
                .map(|(t, v)| (t.clone(), round_to(*v, 2)))
                .collect(),
        })
        .collect()
}

impl AllocationReport {
    pub fn build(
        result: &OptimizationResult,
        prices: &PriceMatrix,
        benchmarks: &[BenchmarkResult],
        frontier: &[FrontierPoint],
        recent_rows: usize,
        risk_free_rate: f64,
        target: Option<RiskTarget>,
    ) -> Self {
        let mut strategies: BTreeMap<&'static str, BTreeMap<&'static str, StrategyView>> =
            BTreeMap::new();
        for r in &result.strategies {
            let view = StrategyView {
                allocation: result
                    .tickers
                    .iter()
                    .zip(r.weights.iter())
                    .map(|(t, w)| (t.clone(), pct(*w, 1)))
                    .collect(),
                metrics: MetricsView::from_metrics(&r.metrics),
                status: r.status,
                history: round_curve(&r.curves.history),
                drawdowns: round_curve(&r.curves.drawdowns),
                risk_decomposition: RiskView::from_decomposition(&r.risk),
            };
            strategies
                .entry(r.strategy.display_name())
                .or_default()
                .insert(r.mode.as_str(), view);
        }

        let benchmarks = benchmarks
            .iter()
            .map(|b| {
                let view = BenchmarkView {
                    allocation: b
                        .allocation
                        .iter()
                        .map(|(t, w)| (t.clone(), pct(*w, 1)))
                        .collect(),
                    metrics: MetricsView::from_metrics(&b.metrics),
                    history: round_curve(&b.curves.history),
                    drawdowns: round_curve(&b.curves.drawdowns),
                    risk_decomposition: RiskView::from_decomposition(&b.risk),
                };
                (b.name.clone(), view)
            })
            .collect();

        AllocationReport {
            status: "success",
            meta: ReportMeta {
                lookback: result.lookback_days,
                shrinkage: round_to(result.shrinkage, 4),
                risk_free_rate,
                target,
                diagnostics: Diagnostics {
                    correlation: CorrelationView {
                        tickers: result.tickers.clone(),
                        matrix: round_matrix(&result.correlation, 2),
                    },
                },
                dendrogram: DendrogramView {
                    linkage: result.clusters.linkage.clone(),
                    labels: result.tickers.clone(),
                    leaf_order: result.clusters.leaf_order.clone(),
                },
                frontier: frontier
                    .iter()
                    .map(|p| FrontierView {
                        x: pct(p.annual_volatility, 2),
                        y: pct(p.annual_return, 2),
                    })
                    .collect(),
                skipped: Vec::new(),
            },
            recent_prices: recent_prices(prices, recent_rows),
            strategies,
            benchmarks,
        }
    }

    /// Records tickers that were requested but could not be loaded.
    pub fn with_skipped(mut self, skipped: &[SkippedTicker]) -> Self {
        self.meta.skipped = skipped
            .iter()
            .map(|s| SkippedView {
                ticker: s.ticker.clone(),
                reason: s.reason.to_string(),
            })
            .collect();
        self
    }
}
