//! JSON export of backtest results.
//!
//! Undefined statistics (`z_score` before the window fills, ratios over an
//! empty trade log) are written as `null`.

use crate::domain::error::FundingError;
use crate::domain::report::BacktestResult;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct JsonReport;

pub fn write_json<T: Serialize + ?Sized, W: Write>(value: &T, writer: W) -> Result<(), FundingError> {
    serde_json::to_writer_pretty(writer, value).map_err(|e| FundingError::DataSource {
        reason: format!("JSON write error: {e}"),
    })
}

/// Write `value` to a new file at `path`, replacing any existing one.
pub fn write_json_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), FundingError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_json(value, &mut writer)?;
    writer.flush()?;
    Ok(())
}

impl ReportPort for JsonReport {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), FundingError> {
        write_json_file(result, output_path)
    }
}
