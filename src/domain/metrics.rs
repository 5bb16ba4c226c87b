//! Performance summary over a trade log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::{ExitReason, Trade};

/// Headline statistics for one backtest run.
///
/// Ratios over trades are `None` when there is nothing to average.
/// `largest_loss` and `max_drawdown` are reported as non-negative magnitudes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: Option<f64>,
    pub total_pnl: f64,
    pub total_price_pnl: f64,
    pub total_funding_pnl: f64,
    pub avg_pnl: Option<f64>,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub avg_holding_periods: Option<f64>,
    pub avg_holding_hours: Option<f64>,
    pub exits: ExitCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExitCounts {
    pub stop_loss: usize,
    pub time_limit: usize,
    pub signal_reversal: usize,
    pub end_of_data: usize,
}

impl ExitCounts {
    fn record(&mut self, reason: ExitReason) {
        match reason {
            ExitReason::StopLoss => self.stop_loss += 1,
            ExitReason::TimeLimit => self.time_limit += 1,
            ExitReason::SignalReversal => self.signal_reversal += 1,
            ExitReason::EndOfData => self.end_of_data += 1,
        }
    }
}

/// Reduce a trade log to a [`Summary`].
pub fn aggregate(trades: &[Trade]) -> Summary {
    let mut summary = Summary::default();
    let mut total_wins = 0.0_f64;
    let mut total_losses = 0.0_f64;
    let mut total_periods = 0u64;
    let mut total_hours = 0.0_f64;

    for trade in trades {
        let pnl = trade.pnl;
        if pnl > 0.0 {
            summary.trades_won += 1;
            total_wins += pnl;
            if pnl > summary.largest_win {
                summary.largest_win = pnl;
            }
        } else if pnl < 0.0 {
            summary.trades_lost += 1;
            total_losses += pnl.abs();
            if pnl.abs() > summary.largest_loss {
                summary.largest_loss = pnl.abs();
            }
        } else {
            summary.trades_breakeven += 1;
        }

        summary.total_pnl += pnl;
        summary.total_price_pnl += trade.price_pnl;
        summary.total_funding_pnl += trade.funding_pnl;
        total_periods += u64::from(trade.holding_periods);
        total_hours += trade.holding_hours();
        summary.exits.record(trade.exit_reason);
    }

    let n = trades.len();
    summary.total_trades = n;
    if n == 0 {
        return summary;
    }

    summary.win_rate = Some(summary.trades_won as f64 / n as f64);
    summary.avg_pnl = Some(summary.total_pnl / n as f64);
    summary.avg_holding_periods = Some(total_periods as f64 / n as f64);
    summary.avg_holding_hours = Some(total_hours / n as f64);
    summary.profit_factor = if total_losses > 0.0 {
        Some(total_wins / total_losses)
    } else {
        None
    };
    summary.sharpe_ratio = compute_sharpe(trades);
    summary.max_drawdown = compute_drawdown(trades);

    summary
}

/// Largest peak-to-trough fall of cumulative pnl, replaying trades by exit
/// time. The curve starts at zero.
fn compute_drawdown(trades: &[Trade]) -> f64 {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_timestamp);

    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for trade in ordered {
        cumulative += trade.pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = peak - cumulative;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    max_dd
}

/// Account equity after one closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Trade pnl replayed against a starting account balance.
///
/// Pnl is booked one unit of notional per trade, so
/// `final_capital = initial_capital + total_pnl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSummary {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    /// One point per trade, in exit order.
    pub equity_curve: Vec<EquityPoint>,
}

/// Replay `trades` by exit time on top of `initial_capital`.
pub fn capital_summary(trades: &[Trade], initial_capital: f64) -> CapitalSummary {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.exit_timestamp);

    let mut equity = initial_capital;
    let equity_curve = ordered
        .into_iter()
        .map(|trade| {
            equity += trade.pnl;
            EquityPoint {
                timestamp: trade.exit_timestamp,
                equity,
            }
        })
        .collect();

    let total_return = equity - initial_capital;
    CapitalSummary {
        initial_capital,
        final_capital: equity,
        total_return,
        total_return_pct: total_return / initial_capital * 100.0,
        equity_curve,
    }
}

/// Mean over sample standard deviation of per-trade pnl.
fn compute_sharpe(trades: &[Trade]) -> Option<f64> {
    if trades.len() < 2 {
        return None;
    }
    let n = trades.len() as f64;
    let mean = trades.iter().map(|t| t.pnl).sum::<f64>() / n;
    let variance = trades.iter().map(|t| (t.pnl - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 { Some(mean / stddev) } else { None }
}
