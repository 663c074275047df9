//! Price data access port.

use crate::domain::error::AllocatorError;
use crate::domain::prices::ClosePoint;
use chrono::NaiveDate;

pub trait PricePort {
    /// Daily closes for `ticker`, ascending by date, optionally clipped to
    /// `[start, end]`. An unknown ticker is `AllocatorError::NoData`.
    fn fetch_closes(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<ClosePoint>, AllocatorError>;

    /// First date, last date and row count, or `None` when the ticker has no rows.
    fn data_range(&self, ticker: &str) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocatorError>;
}
