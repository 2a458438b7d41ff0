//! JSON price input and JSON result output.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::DcaError;
use crate::domain::price::{PricePoint, sort_by_date};
use crate::domain::simulation::SimulationResult;
use crate::domain::sweep::SweepOutcome;
use crate::ports::data_port::PriceSource;
use crate::ports::report_port::ReportPort;

/// Reads an array of `{"date": "YYYY-MM-DD", "price": 123.4}` objects.
pub struct JsonPriceAdapter {
    path: PathBuf,
}

impl JsonPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn parse(content: &str) -> Result<Vec<PricePoint>, DcaError> {
        let mut points: Vec<PricePoint> =
            serde_json::from_str(content).map_err(|e| DcaError::Data {
                reason: format!("JSON parse error: {}", e),
            })?;
        sort_by_date(&mut points);
        Ok(points)
    }
}

impl PriceSource for JsonPriceAdapter {
    fn load_prices(&self) -> Result<Vec<PricePoint>, DcaError> {
        let content = fs::read_to_string(&self.path).map_err(|e| DcaError::Data {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let points = Self::parse(&content)?;
        tracing::debug!(path = %self.path.display(), rows = points.len(), "loaded JSON prices");
        Ok(points)
    }
}

/// Writes the full simulation result as pretty-printed JSON.
#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_value<T: serde::Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<(), DcaError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| DcaError::Report {
            reason: format!("failed to serialize result: {}", e),
        })?;
        fs::write(output_path, json)?;
        Ok(())
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, result: &SimulationResult, output_path: &Path) -> Result<(), DcaError> {
        Self::write_value(result, output_path)
    }

    fn write_sweep(&self, outcomes: &[SweepOutcome], output_path: &Path) -> Result<(), DcaError> {
        Self::write_value(outcomes, output_path)
    }
}
