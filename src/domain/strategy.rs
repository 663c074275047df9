//! Allocation strategies, modes, and their results.

use crate::domain::history::PerformanceCurves;
use crate::domain::hrp::LinkageRow;
use crate::domain::metrics::PortfolioMetrics;
use crate::domain::risk::RiskDecomposition;
use crate::domain::solver::SolveStatus;
use ndarray::{Array1, Array2};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    RiskParity,
    MaxSharpe,
    Hrp,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::RiskParity, Strategy::MaxSharpe, Strategy::Hrp];

    pub fn display_name(&self) -> &'static str {
        match self {
            Strategy::RiskParity => "Risk Parity",
            Strategy::MaxSharpe => "Max Sharpe",
            Strategy::Hrp => "HRP",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
    Unconstrained,
    Constrained,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Unconstrained, Mode::Constrained];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Unconstrained => "unconstrained",
            Mode::Constrained => "constrained",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyResult {
    pub strategy: Strategy,
    pub mode: Mode,
    /// Final weights in asset column order, after any leverage targeting.
    pub weights: Array1<f64>,
    pub status: SolveStatus,
    pub metrics: PortfolioMetrics,
    pub curves: PerformanceCurves,
    pub risk: RiskDecomposition,
}

/// Data handed to the visualization collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterView {
    pub linkage: Vec<LinkageRow>,
    /// Tickers in quasi-diagonal order.
    pub leaf_order: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub tickers: Vec<String>,
    pub lookback_days: usize,
    pub shrinkage: f64,
    /// Always `Strategy::ALL x Mode::ALL`, in that order.
    pub strategies: Vec<StrategyResult>,
    pub correlation: Array2<f64>,
    pub covariance: Array2<f64>,
    pub mean: Array1<f64>,
    pub clusters: ClusterView,
}

impl OptimizationResult {
    pub fn get(&self, strategy: Strategy, mode: Mode) -> Option<&StrategyResult> {
        self.strategies
            .iter()
            .find(|r| r.strategy == strategy && r.mode == mode)
    }

    pub fn fallbacks(&self) -> impl Iterator<Item = &StrategyResult> {
        self.strategies
            .iter()
            .filter(|r| r.status == SolveStatus::FellBackToEqualWeight)
    }
}
