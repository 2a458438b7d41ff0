//! Report generation port trait.

use std::path::Path;

use crate::domain::error::DcaError;
use crate::domain::simulation::SimulationResult;
use crate::domain::sweep::SweepOutcome;

/// Port for writing simulation reports.
pub trait ReportPort {
    fn write(&self, result: &SimulationResult, output_path: &Path) -> Result<(), DcaError>;

    /// One row or entry per sweep variant, in grid order.
    fn write_sweep(&self, outcomes: &[SweepOutcome], output_path: &Path) -> Result<(), DcaError>;
}
