//! CSV file price adapter.
//!
//! Reads `{dir}/{TICKER}.csv`. The header row must name a `date` column and
//! either an `adj_close` or a `close` column; other columns are ignored.

use crate::domain::error::AllocatorError;
use crate::domain::prices::ClosePoint;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn read_all(&self, ticker: &str) -> Result<Vec<ClosePoint>, AllocatorError> {
        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AllocatorError::NoData {
                ticker: ticker.to_string(),
            },
            _ => AllocatorError::Data {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| AllocatorError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };
        let date_col = find("date").ok_or_else(|| AllocatorError::Data {
            reason: format!("{} has no date column", path.display()),
        })?;
        let close_col = find("adj_close")
            .or_else(|| find("close"))
            .ok_or_else(|| AllocatorError::Data {
                reason: format!("{} has no adj_close or close column", path.display()),
            })?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| AllocatorError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                AllocatorError::Data {
                    reason: format!("invalid date '{}' for {}: {}", date_str, ticker, e),
                }
            })?;

            let close_str = record.get(close_col).unwrap_or_default();
            if close_str.is_empty() {
                continue;
            }
            let close: f64 = close_str.parse().map_err(|e| AllocatorError::Data {
                reason: format!("invalid close '{}' for {}: {}", close_str, ticker, e),
            })?;
            if !close.is_finite() {
                continue;
            }

            points.push(ClosePoint { date, close });
        }

        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Ok(points)
    }
}

impl PricePort for CsvAdapter {
    fn fetch_closes(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ClosePoint>, AllocatorError> {
        let mut points = self.read_all(ticker)?;
        points.retain(|p| start.is_none_or(|s| p.date >= s) && end.is_none_or(|e| p.date <= e));
        Ok(points)
    }

    fn data_range(&self, ticker: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocatorError> {
        let points = self.read_all(ticker)?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, points.len())),
            _ => None,
        })
    }
}
