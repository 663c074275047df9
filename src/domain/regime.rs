//! Lookback selection and the full allocation pipeline.
//!
//! Each candidate window is scored by the Sharpe ratio of a loose
//! unconstrained max-Sharpe solve on that window's statistics. The highest
//! score wins; ties keep the shorter window. Every strategy is then solved
//! in both modes on the winning window.

use crate::domain::error::AllocatorError;
use crate::domain::estimators::{correlation, ewma_means, shrunk_covariance};
use crate::domain::history::PerformanceCurves;
use crate::domain::hrp;
use crate::domain::leverage::{self, LeverageCaps, RiskTarget};
use crate::domain::max_sharpe;
use crate::domain::metrics::{DEFAULT_VAR_CONFIDENCE, PortfolioMetrics, RiskReturn};
use crate::domain::prices::{PriceMatrix, ReturnMatrix};
use crate::domain::risk::RiskDecomposition;
use crate::domain::risk_parity;
use crate::domain::solver::{Solution, SolverSettings, WeightBounds};
use crate::domain::strategy::{ClusterView, Mode, OptimizationResult, Strategy, StrategyResult};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

pub const DEFAULT_WINDOWS: [usize; 4] = [63, 126, 252, 504];
pub const SHORT_HISTORY_ROWS: usize = 200;
const SHORT_HISTORY_TRIM: usize = 5;

/// Annual risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.045;

pub const MIN_ASSETS: usize = 2;
pub const MIN_ROWS: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerSettings {
    pub windows: Vec<usize>,
    /// Histories shorter than this use a single window of `rows - 5`.
    pub short_history_rows: usize,
    /// Bounds for the constrained mode; unconstrained is always long-only.
    pub bounds: WeightBounds,
    pub risk_free_rate: f64,
    pub target: Option<RiskTarget>,
    pub var_confidence: f64,
    pub leverage_caps: LeverageCaps,
    pub scoring: SolverSettings,
    pub final_solve: SolverSettings,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
            short_history_rows: SHORT_HISTORY_ROWS,
            bounds: WeightBounds::LONG_ONLY,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            target: None,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
            leverage_caps: LeverageCaps::default(),
            scoring: SolverSettings::with_tolerance(max_sharpe::SCORING_TOLERANCE),
            final_solve: SolverSettings::with_tolerance(max_sharpe::FINAL_TOLERANCE),
        }
    }
}

/// Shrunk covariance, EWMA mean, and returns of one lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub window: usize,
    pub returns: ReturnMatrix,
    pub covariance: Array2<f64>,
    pub shrinkage: f64,
    pub mean: Array1<f64>,
}

impl WindowStats {
    /// `None` when the window yields no returns.
    pub fn compute(prices: &PriceMatrix, window: usize) -> Option<Self> {
        let returns = prices.tail(window).returns();
        if returns.is_empty() {
            return None;
        }
        let shrunk = shrunk_covariance(&returns);
        let mean = ewma_means(&returns, window);
        Some(Self {
            window,
            returns,
            covariance: shrunk.covariance,
            shrinkage: shrunk.shrinkage,
            mean,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowScore {
    pub window: usize,
    pub sharpe: f64,
}

/// Boundary contract checked before any computation.
pub fn check_inputs(prices: &PriceMatrix, settings: &OptimizerSettings) -> Result<(), AllocatorError> {
    if prices.asset_count() < MIN_ASSETS {
        return Err(AllocatorError::InsufficientData {
            reason: format!(
                "need at least {} assets, have {}",
                MIN_ASSETS,
                prices.asset_count()
            ),
        });
    }
    if prices.row_count() < MIN_ROWS {
        return Err(AllocatorError::InsufficientData {
            reason: format!(
                "need at least {} aligned rows, have {}",
                MIN_ROWS,
                prices.row_count()
            ),
        });
    }
    let bounds = WeightBounds::new(settings.bounds.min_weight, settings.bounds.max_weight)?;
    let n = prices.asset_count();
    if !bounds.admits(n) {
        return Err(AllocatorError::InvalidInput {
            reason: format!(
                "weight bounds [{}, {}] cannot sum to 1 over {} assets",
                bounds.min_weight, bounds.max_weight, n
            ),
        });
    }
    match settings.target {
        Some(RiskTarget::Volatility(v)) | Some(RiskTarget::Var(v)) if !(v > 0.0) => {
            return Err(AllocatorError::InvalidInput {
                reason: format!("risk target must be positive, got {v}"),
            });
        }
        _ => {}
    }
    if !(settings.var_confidence > 0.0 && settings.var_confidence < 1.0) {
        return Err(AllocatorError::InvalidInput {
            reason: format!(
                "VaR confidence must be in (0, 1), got {}",
                settings.var_confidence
            ),
        });
    }
    Ok(())
}

/// Windows to try, in ascending order, that are shorter than the history.
pub fn candidate_windows(rows: usize, settings: &OptimizerSettings) -> Vec<usize> {
    let mut windows = if rows < settings.short_history_rows {
        vec![rows.saturating_sub(SHORT_HISTORY_TRIM)]
    } else {
        settings.windows.clone()
    };
    windows.sort_unstable();
    windows.dedup();
    windows.retain(|&w| w > 0 && w < rows);
    windows
}

fn score(stats: &WindowStats, settings: &OptimizerSettings) -> f64 {
    let solution = max_sharpe::optimize(
        &stats.mean,
        &stats.covariance,
        settings.risk_free_rate,
        &WeightBounds::LONG_ONLY,
        &settings.scoring,
    );
    RiskReturn::compute(
        &solution.weights,
        &stats.mean,
        &stats.covariance,
        settings.risk_free_rate,
    )
    .sharpe_ratio
}

/// Index of the highest score. A later score must be strictly greater to
/// win, so ties keep the earlier (shorter) window.
pub fn best_score(scores: &[WindowScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, score) in scores.iter().enumerate() {
        if best.is_none_or(|b| score.sharpe > scores[b].sharpe) {
            best = Some(i);
        }
    }
    best
}

/// Scores every candidate window and returns the winner's statistics.
///
/// Windows are scored in parallel but compared in ascending order, so the
/// outcome does not depend on scheduling.
pub fn select_window(
    prices: &PriceMatrix,
    settings: &OptimizerSettings,
) -> Result<(WindowStats, Vec<WindowScore>), AllocatorError> {
    let windows = candidate_windows(prices.row_count(), settings);
    let sweep = info_span!("regime_sweep", candidates = windows.len());
    let _guard = sweep.enter();
    let started = Instant::now();

    let scored: Vec<Option<(WindowStats, f64)>> = windows
        .par_iter()
        .map(|&window| {
            let span = info_span!(parent: &sweep, "score_window", window);
            let _enter = span.enter();
            let t = Instant::now();
            let stats = WindowStats::compute(prices, window)?;
            let sharpe = score(&stats, settings);
            debug!(
                sharpe,
                shrinkage = stats.shrinkage,
                elapsed_ms = t.elapsed().as_millis() as u64,
                "window scored"
            );
            sharpe.is_finite().then_some((stats, sharpe))
        })
        .collect();

    let mut candidates: Vec<WindowStats> = Vec::new();
    let mut scores = Vec::new();
    for (stats, sharpe) in scored.into_iter().flatten() {
        scores.push(WindowScore {
            window: stats.window,
            sharpe,
        });
        candidates.push(stats);
    }

    let best = best_score(&scores).ok_or_else(|| AllocatorError::InsufficientData {
        reason: "no lookback window produced usable statistics".into(),
    })?;
    let sharpe = scores[best].sharpe;
    let stats = candidates.swap_remove(best);
    info!(
        window = stats.window,
        sharpe,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "lookback selected"
    );
    Ok((stats, scores))
}

fn solve(strategy: Strategy, mode: Mode, stats: &WindowStats, settings: &OptimizerSettings) -> Solution {
    let bounds = match mode {
        Mode::Unconstrained => WeightBounds::LONG_ONLY,
        Mode::Constrained => settings.bounds,
    };
    match strategy {
        Strategy::RiskParity => {
            risk_parity::optimize(&stats.covariance, &bounds, &settings.final_solve)
        }
        Strategy::MaxSharpe => max_sharpe::optimize(
            &stats.mean,
            &stats.covariance,
            settings.risk_free_rate,
            &bounds,
            &settings.final_solve,
        ),
        // HRP ignores box constraints; both modes run the same computation.
        Strategy::Hrp => hrp::allocate(&stats.covariance),
    }
}

fn evaluate(
    strategy: Strategy,
    mode: Mode,
    solution: Solution,
    stats: &WindowStats,
    settings: &OptimizerSettings,
) -> StrategyResult {
    let weights = leverage::apply_target(
        &solution.weights,
        settings.target,
        &stats.covariance,
        &stats.returns,
        settings.var_confidence,
        &settings.leverage_caps,
    );
    let metrics = PortfolioMetrics::compute(
        &weights,
        &stats.mean,
        &stats.covariance,
        &stats.returns,
        settings.risk_free_rate,
        settings.var_confidence,
    );
    let curves = PerformanceCurves::compute(&weights, &stats.returns);
    let risk = RiskDecomposition::compute(stats.returns.tickers(), &weights, &stats.covariance);
    StrategyResult {
        strategy,
        mode,
        weights,
        status: solution.status,
        metrics,
        curves,
        risk,
    }
}

/// Runs every strategy in both modes on `stats`.
pub fn run_strategies(stats: &WindowStats, settings: &OptimizerSettings) -> Vec<StrategyResult> {
    let mut results = Vec::with_capacity(Strategy::ALL.len() * Mode::ALL.len());
    for strategy in Strategy::ALL {
        for mode in Mode::ALL {
            let span = info_span!("strategy_solve", %strategy, %mode);
            let _enter = span.enter();
            let t = Instant::now();
            let solution = solve(strategy, mode, stats, settings);
            if solution.is_fallback() {
                warn!("solver did not converge, using equal weights");
            }
            debug!(
                status = ?solution.status,
                elapsed_ms = t.elapsed().as_millis() as u64,
                "strategy solved"
            );
            results.push(evaluate(strategy, mode, solution, stats, settings));
        }
    }
    results
}

/// Full pipeline: boundary checks, lookback selection, every strategy in
/// both modes, then analytics on the winning window.
pub fn optimize(prices: &PriceMatrix, settings: &OptimizerSettings) -> Result<OptimizationResult, AllocatorError> {
    check_inputs(prices, settings)?;
    let (stats, _scores) = select_window(prices, settings)?;

    let strategies = run_strategies(&stats, settings);

    let tree = hrp::cluster(&stats.covariance);
    let tickers = prices.tickers().to_vec();
    let clusters = ClusterView {
        linkage: tree.linkage(),
        leaf_order: tree
            .quasi_diagonal_order()
            .into_iter()
            .map(|i| tickers[i].clone())
            .collect(),
    };

    Ok(OptimizationResult {
        tickers,
        lookback_days: stats.window,
        shrinkage: stats.shrinkage,
        strategies,
        correlation: correlation(&stats.covariance),
        covariance: stats.covariance,
        mean: stats.mean,
        clusters,
    })
}
