//! Backtest result assembly.

use serde::{Deserialize, Serialize};

use super::detector::{AnomalyPoint, SignalStats};
use super::error::FundingError;
use super::metrics::{CapitalSummary, Summary};
use super::position::Trade;

/// Everything the presentation layer needs from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub series: Vec<AnomalyPoint>,
    pub trades: Vec<Trade>,
    pub summary: Summary,
    pub capital: CapitalSummary,
    pub signal_stats: SignalStats,
}

/// Combine detector output, trade log, summary and capital replay.
///
/// Every trade must enter and exit within the series' timestamp range, and
/// the summary and equity curve must describe exactly the given trades.
pub fn assemble(
    series: Vec<AnomalyPoint>,
    trades: Vec<Trade>,
    summary: Summary,
    capital: CapitalSummary,
) -> Result<BacktestResult, FundingError> {
    if summary.total_trades != trades.len() {
        return Err(FundingError::InconsistentData {
            reason: format!(
                "summary counts {} trades but the log holds {}",
                summary.total_trades,
                trades.len()
            ),
        });
    }

    check_capital(&capital, &summary, trades.len())?;

    if let Some(trade) = trades.first() {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Err(FundingError::InconsistentData {
                reason: format!(
                    "trade entered at {} but the series is empty",
                    trade.entry_timestamp
                ),
            });
        };
        let range = first.timestamp..=last.timestamp;

        for (i, trade) in trades.iter().enumerate() {
            if !range.contains(&trade.entry_timestamp) || !range.contains(&trade.exit_timestamp) {
                return Err(FundingError::InconsistentData {
                    reason: format!(
                        "trade {} ({} to {}) falls outside series range {} to {}",
                        i,
                        trade.entry_timestamp,
                        trade.exit_timestamp,
                        first.timestamp,
                        last.timestamp
                    ),
                });
            }
        }
    }

    let signal_stats = SignalStats::from_points(&series);
    Ok(BacktestResult {
        series,
        trades,
        summary,
        capital,
        signal_stats,
    })
}

fn check_capital(
    capital: &CapitalSummary,
    summary: &Summary,
    trade_count: usize,
) -> Result<(), FundingError> {
    if capital.equity_curve.len() != trade_count {
        return Err(FundingError::InconsistentData {
            reason: format!(
                "equity curve has {} points for {} trades",
                capital.equity_curve.len(),
                trade_count
            ),
        });
    }

    let expected = capital.initial_capital + summary.total_pnl;
    let tolerance = 1e-9 * expected.abs().max(1.0);
    if (capital.final_capital - expected).abs() > tolerance {
        return Err(FundingError::InconsistentData {
            reason: format!(
                "final capital {} does not equal initial {} plus total pnl {}",
                capital.final_capital, capital.initial_capital, summary.total_pnl
            ),
        });
    }
    Ok(())
}
