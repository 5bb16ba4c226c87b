//! Backtest pipeline: detect, simulate, aggregate, assemble.
//!
//! Each run owns its state; runs share nothing and may execute in parallel.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::detector::{DetectorConfig, detect};
use super::error::FundingError;
use super::event::{EventWindow, MarketEvent};
use super::metrics::{aggregate, capital_summary};
use super::rate_point::RatePoint;
use super::report::{BacktestResult, assemble};
use super::simulator::{SimulationConfig, simulate};
use crate::ports::data_port::DataPort;

/// Starting account balance when none is configured.
pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub detector: DetectorConfig,
    pub simulation: SimulationConfig,
    pub initial_capital: f64,
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), FundingError> {
        self.detector.validate()?;
        self.simulation.validate()?;
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(FundingError::configuration(
                "initial_capital",
                format!(
                    "initial_capital must be a positive number, got {}",
                    self.initial_capital
                ),
            ));
        }
        Ok(())
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            detector: DetectorConfig::default(),
            simulation: SimulationConfig::default(),
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

/// Run the full pipeline over one series.
pub fn run_backtest(
    series: &[RatePoint],
    config: &BacktestConfig,
) -> Result<BacktestResult, FundingError> {
    config.validate()?;

    let points = detect(series, &config.detector)?;
    let trades = simulate(&points, &config.simulation)?;
    let summary = aggregate(&trades);
    let capital = capital_summary(&trades, config.initial_capital);

    info!(
        points = points.len(),
        trades = summary.total_trades,
        total_pnl = summary.total_pnl,
        final_capital = capital.final_capital,
        "backtest complete"
    );

    assemble(points, trades, summary, capital)
}

/// Result of backtesting the window around one catalog event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBacktest {
    pub event: MarketEvent,
    pub result: BacktestResult,
}

/// Load the event's window through `data_port` and backtest it.
pub fn run_event_backtest(
    data_port: &dyn DataPort,
    event: &MarketEvent,
    window: &EventWindow,
    config: &BacktestConfig,
) -> Result<EventBacktest, FundingError> {
    let range = event.time_range(window)?;
    let series = data_port.fetch_funding(event.coin, &range)?;
    if series.is_empty() {
        return Err(FundingError::NoData {
            coin: event.coin.to_string(),
        });
    }

    info!(event = %event.name, coin = %event.coin, points = series.len(), "running event backtest");
    let result = run_backtest(&series, config)?;
    Ok(EventBacktest {
        event: event.clone(),
        result,
    })
}

/// Backtest every event in order. Events whose data cannot be loaded are
/// skipped with a warning; malformed data and bad parameters abort the run.
pub fn run_event_backtests(
    data_port: &dyn DataPort,
    events: &[MarketEvent],
    window: &EventWindow,
    config: &BacktestConfig,
) -> Result<Vec<EventBacktest>, FundingError> {
    config.validate()?;

    let mut results = Vec::with_capacity(events.len());
    for event in events {
        match run_event_backtest(data_port, event, window, config) {
            Ok(r) => results.push(r),
            Err(e @ (FundingError::NoData { .. } | FundingError::DataSource { .. })) => {
                warn!(event = %event.name, coin = %event.coin, error = %e, "skipping event");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::ExitReason;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn make_series(rates: &[f64]) -> Vec<RatePoint> {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rates
            .iter()
            .enumerate()
            .map(|(i, &r)| RatePoint::new(start + Duration::hours(8 * i as i64), r))
            .collect()
    }

    fn config(window: usize, threshold: f64) -> BacktestConfig {
        BacktestConfig {
            detector: DetectorConfig::new(window, threshold).unwrap(),
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn constant_series_no_trades() {
        let result = run_backtest(&make_series(&[0.01; 10]), &config(5, 2.0)).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.summary.total_pnl, 0.0);
        assert_eq!(result.series.len(), 10);
    }

    #[test]
    fn spike_at_end_opens_and_force_closes() {
        let mut rates = vec![0.01; 19];
        rates.push(0.10);
        let result = run_backtest(&make_series(&rates), &config(10, 2.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(result.signal_stats.short_signals, 1);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let bad = BacktestConfig {
            detector: DetectorConfig {
                window: 1,
                threshold: 2.0,
            },
            ..BacktestConfig::default()
        };
        assert!(matches!(
            run_backtest(&make_series(&[0.01]), &bad),
            Err(FundingError::Configuration { .. })
        ));
    }

    #[test]
    fn non_positive_capital_rejected() {
        let bad = BacktestConfig {
            initial_capital: 0.0,
            ..BacktestConfig::default()
        };
        assert!(matches!(
            run_backtest(&make_series(&[0.01; 3]), &bad),
            Err(FundingError::Configuration { .. })
        ));
    }

    #[test]
    fn capital_tracks_total_pnl() {
        let mut rates = vec![0.01; 19];
        rates.push(0.10);
        let bt = BacktestConfig {
            initial_capital: 500.0,
            ..config(10, 2.0)
        };
        let result = run_backtest(&make_series(&rates), &bt).unwrap();

        assert_eq!(result.capital.initial_capital, 500.0);
        assert_eq!(result.capital.equity_curve.len(), result.trades.len());
        assert!((result.capital.final_capital - (500.0 + result.summary.total_pnl)).abs() < 1e-12);
    }
}
