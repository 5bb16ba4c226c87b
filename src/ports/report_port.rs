//! Report output port.

use std::path::Path;

use crate::domain::error::FundingError;
use crate::domain::report::BacktestResult;

/// Port for writing backtest results.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), FundingError>;
}
