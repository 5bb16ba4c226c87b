//! CSV trade log export.
//!
//! Columns: entry_timestamp, exit_timestamp, direction, entry_value,
//! exit_value, pnl, exit_reason. Timestamps are RFC 3339 UTC.

use crate::domain::error::FundingError;
use crate::domain::position::Trade;
use crate::domain::report::BacktestResult;
use crate::ports::report_port::ReportPort;
use chrono::SecondsFormat;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const TRADE_COLUMNS: [&str; 7] = [
    "entry_timestamp",
    "exit_timestamp",
    "direction",
    "entry_value",
    "exit_value",
    "pnl",
    "exit_reason",
];

pub struct CsvTradeReport;

fn csv_error(e: csv::Error) -> FundingError {
    FundingError::DataSource {
        reason: format!("CSV write error: {e}"),
    }
}

/// Serialise `trades` as delimited text to `writer`.
pub fn write_trades<W: Write>(trades: &[Trade], writer: W) -> Result<(), FundingError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(TRADE_COLUMNS).map_err(csv_error)?;

    for trade in trades {
        wtr.write_record([
            trade
                .entry_timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            trade
                .exit_timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            trade.direction.to_string(),
            trade.entry_value.to_string(),
            trade.exit_value.to_string(),
            trade.pnl.to_string(),
            trade.exit_reason.to_string(),
        ])
        .map_err(csv_error)?;
    }

    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvTradeReport {
    fn write(&self, result: &BacktestResult, output_path: &Path) -> Result<(), FundingError> {
        let file = File::create(output_path)?;
        write_trades(&result.trades, file)
    }
}
