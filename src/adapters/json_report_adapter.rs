//! JSON report adapter.

use crate::domain::error::AllocatorError;
use crate::domain::report::AllocationReport;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportAdapter {
    pub pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, report: &AllocationReport) -> Result<String, AllocatorError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(json)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &AllocationReport, output_path: &Path) -> Result<(), AllocatorError> {
        let json = self.render(report)?;
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, json)?;
        Ok(())
    }
}
