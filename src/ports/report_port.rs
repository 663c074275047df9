//! Report output port trait.

use crate::domain::error::AllocatorError;
use crate::domain::report::AllocationReport;
use std::path::Path;

/// Port for writing allocation reports.
pub trait ReportPort {
    fn write(&self, report: &AllocationReport, output_path: &Path) -> Result<(), AllocatorError>;
}
