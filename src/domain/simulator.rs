//! Position simulation driven by anomaly signals.
//!
//! A single position slot is threaded through the loop as a [`PositionState`]
//! value. While holding, each new timestamp first accrues funding (price basis
//! only) and then checks exits in priority order: stop-loss, holding-period
//! cap, signal reversal. A position still open after the last point is closed
//! with [`ExitReason::EndOfData`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::detector::AnomalyPoint;
use super::error::FundingError;
use super::position::{Direction, ExitReason, OpenPosition, PositionState, Trade};
use super::rate_point::{ValueBasis, validate_points};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub max_holding_periods: u32,
    /// Loss since entry, in percent of the entry value, that closes a position.
    /// 0 disables the stop.
    pub stop_loss_pct: f64,
    /// Allow opening a new position at the timestamp another one closed.
    pub allow_reentry_same_period: bool,
}

impl SimulationConfig {
    pub fn new(
        max_holding_periods: u32,
        stop_loss_pct: f64,
        allow_reentry_same_period: bool,
    ) -> Result<Self, FundingError> {
        let config = SimulationConfig {
            max_holding_periods,
            stop_loss_pct,
            allow_reentry_same_period,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FundingError> {
        if self.max_holding_periods < 1 {
            return Err(FundingError::configuration(
                "max_holding_periods",
                "max_holding_periods must be at least 1",
            ));
        }
        if !self.stop_loss_pct.is_finite() || self.stop_loss_pct < 0.0 {
            return Err(FundingError::configuration(
                "stop_loss_pct",
                format!(
                    "stop_loss_pct must be non-negative, got {}",
                    self.stop_loss_pct
                ),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_holding_periods: 9,
            stop_loss_pct: 0.0,
            allow_reentry_same_period: false,
        }
    }
}

/// Replay `points` in order and return the closed trades.
///
/// Fails with `InvalidInput` on duplicate or out-of-order timestamps,
/// non-finite values, or partial price coverage. An empty series yields no
/// trades.
pub fn simulate(
    points: &[AnomalyPoint],
    config: &SimulationConfig,
) -> Result<Vec<Trade>, FundingError> {
    config.validate()?;
    let basis = validate_points(points.iter().map(|p| (p.timestamp, p.rate, p.price)))?;

    let mut trades = Vec::new();
    let mut state = PositionState::Flat;

    for point in points {
        state = advance(state, point, basis, config, &mut trades);
    }

    if let (PositionState::Holding(position), Some(last)) = (state, points.last()) {
        let trade = position.close(last.timestamp, value_of(last, basis), ExitReason::EndOfData);
        debug!(
            direction = %trade.direction,
            exit = %trade.exit_timestamp,
            pnl = trade.pnl,
            "force-closed open position at end of data"
        );
        trades.push(trade);
    }

    Ok(trades)
}

fn value_of(point: &AnomalyPoint, basis: ValueBasis) -> f64 {
    match basis {
        ValueBasis::Rate => point.rate,
        ValueBasis::Price => point.price.unwrap_or(point.rate),
    }
}

fn advance(
    state: PositionState,
    point: &AnomalyPoint,
    basis: ValueBasis,
    config: &SimulationConfig,
    trades: &mut Vec<Trade>,
) -> PositionState {
    let value = value_of(point, basis);

    if let PositionState::Holding(mut position) = state {
        position.elapsed_periods += 1;
        if basis == ValueBasis::Price {
            position.accrue_funding(point.rate, value);
        }

        let Some(reason) = exit_reason(&position, point, value, config) else {
            return PositionState::Holding(position);
        };

        let trade = position.close(point.timestamp, value, reason);
        debug!(
            direction = %trade.direction,
            reason = %trade.exit_reason,
            exit = %trade.exit_timestamp,
            pnl = trade.pnl,
            "closed position"
        );
        trades.push(trade);

        // Only a reversal may reopen at the closing timestamp, and then in
        // the new signal's direction.
        if reason != ExitReason::SignalReversal || !config.allow_reentry_same_period {
            return PositionState::Flat;
        }
    }

    match Direction::from_signal(point.signal) {
        Some(direction) => {
            debug!(%direction, entry = %point.timestamp, value, "opened position");
            PositionState::Holding(OpenPosition::open(direction, point.timestamp, value))
        }
        None => PositionState::Flat,
    }
}

fn exit_reason(
    position: &OpenPosition,
    point: &AnomalyPoint,
    value: f64,
    config: &SimulationConfig,
) -> Option<ExitReason> {
    if position.should_stop_loss(value, config.stop_loss_pct) {
        Some(ExitReason::StopLoss)
    } else if position.elapsed_periods >= config.max_holding_periods {
        Some(ExitReason::TimeLimit)
    } else if position.direction.is_reversed_by(point.signal) {
        Some(ExitReason::SignalReversal)
    } else {
        None
    }
}
