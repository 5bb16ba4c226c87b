//! Position state and closed trades.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_signal(signal: Signal) -> Option<Self> {
        match signal {
            Signal::Long => Some(Direction::Long),
            Signal::Short => Some(Direction::Short),
            Signal::Hold => None,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn is_reversed_by(self, signal: Signal) -> bool {
        Direction::from_signal(signal) == Some(self.opposite())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TimeLimit,
    SignalReversal,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TimeLimit => "TIME_LIMIT",
            ExitReason::SignalReversal => "SIGNAL_REVERSAL",
            ExitReason::EndOfData => "END_OF_DATA",
        })
    }
}

/// An open position: one unit of notional in `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub direction: Direction,
    pub entry_timestamp: DateTime<Utc>,
    pub entry_value: f64,
    pub elapsed_periods: u32,
    pub funding_pnl: f64,
}

impl OpenPosition {
    pub fn open(direction: Direction, entry_timestamp: DateTime<Utc>, entry_value: f64) -> Self {
        OpenPosition {
            direction,
            entry_timestamp,
            entry_value,
            elapsed_periods: 0,
            funding_pnl: 0.0,
        }
    }

    /// Direction-signed value delta since entry.
    pub fn unrealized_pnl(&self, value: f64) -> f64 {
        match self.direction {
            Direction::Long => value - self.entry_value,
            Direction::Short => self.entry_value - value,
        }
    }

    /// Unrealized loss as a percentage of the entry value's magnitude;
    /// `None` when the entry value is zero.
    pub fn unrealized_loss_pct(&self, value: f64) -> Option<f64> {
        if self.entry_value == 0.0 {
            return None;
        }
        Some(-self.unrealized_pnl(value) / self.entry_value.abs() * 100.0)
    }

    /// 0 disables the stop.
    pub fn should_stop_loss(&self, value: f64, stop_loss_pct: f64) -> bool {
        if stop_loss_pct == 0.0 {
            return false;
        }
        self.unrealized_loss_pct(value)
            .is_some_and(|loss| loss > stop_loss_pct)
    }

    /// Funding received for one settlement while held. Longs pay positive
    /// funding and shorts receive it.
    pub fn accrue_funding(&mut self, rate: f64, price: f64) {
        self.funding_pnl += -self.direction.sign() * rate * price;
    }

    pub fn close(
        self,
        exit_timestamp: DateTime<Utc>,
        exit_value: f64,
        exit_reason: ExitReason,
    ) -> Trade {
        let price_pnl = self.unrealized_pnl(exit_value);
        Trade {
            entry_timestamp: self.entry_timestamp,
            exit_timestamp,
            direction: self.direction,
            entry_value: self.entry_value,
            exit_value,
            price_pnl,
            funding_pnl: self.funding_pnl,
            pnl: price_pnl + self.funding_pnl,
            holding_periods: self.elapsed_periods,
            exit_reason,
        }
    }
}

/// The simulator's single position slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Holding(OpenPosition),
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub entry_value: f64,
    pub exit_value: f64,
    /// Direction-signed delta between exit and entry value.
    pub price_pnl: f64,
    /// Funding accrued while held; zero when valued on rate.
    pub funding_pnl: f64,
    pub pnl: f64,
    pub holding_periods: u32,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn holding_hours(&self) -> f64 {
        (self.exit_timestamp - self.entry_timestamp).num_seconds() as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn long_at(value: f64) -> OpenPosition {
        OpenPosition::open(Direction::Long, t0(), value)
    }

    fn short_at(value: f64) -> OpenPosition {
        OpenPosition::open(Direction::Short, t0(), value)
    }

    #[test]
    fn direction_from_signal() {
        assert_eq!(Direction::from_signal(Signal::Long), Some(Direction::Long));
        assert_eq!(Direction::from_signal(Signal::Short), Some(Direction::Short));
        assert_eq!(Direction::from_signal(Signal::Hold), None);
    }

    #[test]
    fn reversal_detection() {
        assert!(Direction::Long.is_reversed_by(Signal::Short));
        assert!(!Direction::Long.is_reversed_by(Signal::Long));
        assert!(!Direction::Long.is_reversed_by(Signal::Hold));
        assert!(Direction::Short.is_reversed_by(Signal::Long));
    }

    #[test]
    fn unrealized_pnl_long_and_short() {
        assert!((long_at(100.0).unrealized_pnl(105.0) - 5.0).abs() < f64::EPSILON);
        assert!((long_at(100.0).unrealized_pnl(95.0) + 5.0).abs() < f64::EPSILON);
        assert!((short_at(100.0).unrealized_pnl(95.0) - 5.0).abs() < f64::EPSILON);
        assert!((short_at(100.0).unrealized_pnl(105.0) + 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_loss_long_triggered() {
        let pos = long_at(100.0);
        assert!(pos.should_stop_loss(99.0, 0.5));
        assert!(!pos.should_stop_loss(99.6, 0.5));
        assert!(!pos.should_stop_loss(101.0, 0.5));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let pos = short_at(100.0);
        assert!(pos.should_stop_loss(101.0, 0.5));
        assert!(!pos.should_stop_loss(99.0, 0.5));
    }

    #[test]
    fn stop_loss_uses_entry_magnitude_for_negative_values() {
        // long a negative funding rate that falls further
        let pos = long_at(-0.02);
        assert!(pos.should_stop_loss(-0.03, 10.0));
        assert!(!pos.should_stop_loss(-0.01, 10.0));
    }

    #[test]
    fn stop_loss_disabled() {
        let pos = long_at(100.0);
        assert!(!pos.should_stop_loss(0.0, 0.0));
        assert!(!long_at(0.0).should_stop_loss(-5.0, 1.0));
    }

    #[test]
    fn funding_accrual_sign() {
        let mut short = short_at(100.0);
        short.accrue_funding(0.001, 100.0);
        assert!((short.funding_pnl - 0.1).abs() < 1e-12);

        let mut long = long_at(100.0);
        long.accrue_funding(0.001, 100.0);
        assert!((long.funding_pnl + 0.1).abs() < 1e-12);

        let mut long = long_at(100.0);
        long.accrue_funding(-0.002, 50.0);
        assert!((long.funding_pnl - 0.1).abs() < 1e-12);
    }

    #[test]
    fn close_builds_trade() {
        let mut pos = short_at(100.0);
        pos.elapsed_periods = 3;
        pos.accrue_funding(0.001, 100.0);
        let trade = pos.close(t0() + Duration::hours(24), 98.0, ExitReason::TimeLimit);

        assert_eq!(trade.direction, Direction::Short);
        assert!((trade.price_pnl - 2.0).abs() < 1e-12);
        assert!((trade.funding_pnl - 0.1).abs() < 1e-12);
        assert!((trade.pnl - 2.1).abs() < 1e-12);
        assert_eq!(trade.holding_periods, 3);
        assert!((trade.holding_hours() - 24.0).abs() < f64::EPSILON);
        assert_eq!(trade.exit_reason, ExitReason::TimeLimit);
    }

    #[test]
    fn exit_reason_display() {
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
        assert_eq!(ExitReason::SignalReversal.to_string(), "SIGNAL_REVERSAL");
        assert_eq!(ExitReason::EndOfData.to_string(), "END_OF_DATA");
    }

    #[test]
    fn position_state_default_flat() {
        assert!(PositionState::default().is_flat());
        assert!(!PositionState::Holding(long_at(1.0)).is_flat());
    }
}
