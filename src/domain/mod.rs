//! Core domain types and logic.

pub mod benchmark;
pub mod config_validation;
pub mod error;
pub mod estimators;
pub mod frontier;
pub mod history;
pub mod hrp;
pub mod leverage;
pub mod max_sharpe;
pub mod metrics;
pub mod prices;
pub mod regime;
pub mod report;
pub mod risk;
pub mod risk_parity;
pub mod solver;
pub mod strategy;
pub mod universe;
