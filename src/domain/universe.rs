//! Ticker universe parsing and price loading.
//!
//! Parses ticker lists from configuration, loads each ticker's closes through
//! a [`PricePort`], and aligns the survivors into a [`PriceMatrix`].

use crate::domain::error::AllocatorError;
use crate::domain::prices::{ClosePoint, PriceMatrix};
use crate::domain::regime::{MIN_ASSETS, MIN_ROWS};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("need at least 2 tickers, got {0}")]
    TooFewTickers(usize),
}

impl From<UniverseError> for AllocatorError {
    fn from(err: UniverseError) -> Self {
        AllocatorError::ConfigInvalid {
            section: "portfolio".into(),
            key: "tickers".into(),
            reason: err.to_string(),
        }
    }
}

/// Splits a comma separated list into unique upper-case tickers.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    if tickers.len() < MIN_ASSETS {
        return Err(UniverseError::TooFewTickers(tickers.len()));
    }
    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    LoadFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => f.write_str("no data in range"),
            SkipReason::LoadFailed(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct LoadedUniverse {
    pub prices: PriceMatrix,
    pub skipped: Vec<SkippedTicker>,
}

/// Loads every ticker, skips the ones without data, and aligns the rest on
/// their common dates.
pub fn load_universe(
    port: &dyn PricePort,
    tickers: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<LoadedUniverse, AllocatorError> {
    let mut series: Vec<(String, Vec<ClosePoint>)> = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        match port.fetch_closes(ticker, start, end) {
            Ok(points) if points.is_empty() => {
                warn!(%ticker, "skipping ticker (no data in range)");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::NoData,
                });
            }
            Ok(points) => {
                info!(%ticker, rows = points.len(), "loaded");
                series.push((ticker.clone(), points));
            }
            Err(e) => {
                warn!(%ticker, error = %e, "skipping ticker");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::LoadFailed(e.to_string()),
                });
            }
        }
    }

    if series.len() < MIN_ASSETS {
        return Err(AllocatorError::InsufficientData {
            reason: format!(
                "need at least {} tickers with data, have {}",
                MIN_ASSETS,
                series.len()
            ),
        });
    }

    let prices = PriceMatrix::align(&series)?;
    if prices.row_count() < MIN_ROWS {
        return Err(AllocatorError::InsufficientData {
            reason: format!(
                "need at least {} aligned rows, have {}",
                MIN_ROWS,
                prices.row_count()
            ),
        });
    }

    if !skipped.is_empty() {
        info!(
            used = series.len(),
            requested = tickers.len(),
            "allocating over a reduced universe"
        );
    }

    Ok(LoadedUniverse { prices, skipped })
}
