//! Configuration validation.
//!
//! Validates all config fields before any series is loaded.

use crate::domain::backtest::DEFAULT_INITIAL_CAPITAL;
use crate::domain::comparison::{MaDeviationDetector, PercentileDetector};
use crate::domain::error::FundingError;
use crate::domain::event::{Coin, MAX_WINDOW_HOURS};
use crate::domain::rate_point::parse_timestamp;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub const DEFAULT_WINDOW: i64 = 20;
pub const DEFAULT_THRESHOLD: f64 = 2.0;
pub const DEFAULT_MAX_HOLDING_PERIODS: i64 = 9;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FundingError> {
    validate_window(config)?;
    validate_threshold(config)?;
    validate_max_holding_periods(config)?;
    validate_stop_loss(config)?;
    validate_reentry(config)?;
    validate_initial_capital(config)?;
    validate_percentile(config)?;
    validate_ma_deviation(config)?;
    validate_event_window(config)?;
    validate_coin(config)?;
    validate_range(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FundingError {
    FundingError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse a key if present; a present but unparseable value is an error
/// rather than a silent fall back to the default.
fn parse_present<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, FundingError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let value = parse_present::<i64>(config, "detector", "window")?.unwrap_or(DEFAULT_WINDOW);
    if value < 2 {
        return Err(invalid("detector", "window", "window must be at least 2"));
    }
    Ok(())
}

fn validate_threshold(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let value =
        parse_present::<f64>(config, "detector", "threshold")?.unwrap_or(DEFAULT_THRESHOLD);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid("detector", "threshold", "threshold must be positive"));
    }
    Ok(())
}

fn validate_max_holding_periods(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let value = parse_present::<i64>(config, "simulation", "max_holding_periods")?
        .unwrap_or(DEFAULT_MAX_HOLDING_PERIODS);
    if value < 1 || value > i64::from(u32::MAX) {
        return Err(invalid(
            "simulation",
            "max_holding_periods",
            "max_holding_periods must be at least 1",
        ));
    }
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let value = parse_present::<f64>(config, "simulation", "stop_loss_pct")?.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(
            "simulation",
            "stop_loss_pct",
            "stop_loss_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_reentry(config: &dyn ConfigPort) -> Result<(), FundingError> {
    match config.get_string("simulation", "allow_reentry_same_period") {
        None => Ok(()),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
            _ => Err(invalid(
                "simulation",
                "allow_reentry_same_period",
                "expected true or false",
            )),
        },
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let value = parse_present::<f64>(config, "backtest", "initial_capital")?
        .unwrap_or(DEFAULT_INITIAL_CAPITAL);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

/// `[percentile]` window defaults to the detector window.
fn validate_percentile(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let defaults = PercentileDetector::default();
    let window = match parse_present::<i64>(config, "percentile", "window")? {
        Some(w) => w,
        None => parse_present::<i64>(config, "detector", "window")?.unwrap_or(DEFAULT_WINDOW),
    };
    if window < 2 {
        return Err(invalid("percentile", "window", "window must be at least 2"));
    }

    let lower = parse_present::<f64>(config, "percentile", "lower_pct")?
        .unwrap_or(defaults.lower_pct);
    let upper = parse_present::<f64>(config, "percentile", "upper_pct")?
        .unwrap_or(defaults.upper_pct);
    for (key, value) in [("lower_pct", lower), ("upper_pct", upper)] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(invalid(
                "percentile",
                key,
                format!("{key} must be between 0 and 100"),
            ));
        }
    }
    if lower >= upper {
        return Err(invalid(
            "percentile",
            "lower_pct",
            "lower_pct must be below upper_pct",
        ));
    }
    Ok(())
}

fn validate_ma_deviation(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let defaults = MaDeviationDetector::default();
    let short = parse_present::<i64>(config, "ma_deviation", "short_window")?
        .unwrap_or(defaults.short_window as i64);
    let long = parse_present::<i64>(config, "ma_deviation", "long_window")?
        .unwrap_or(defaults.long_window as i64);
    if short < 1 {
        return Err(invalid(
            "ma_deviation",
            "short_window",
            "short_window must be at least 1",
        ));
    }
    if long <= short {
        return Err(invalid(
            "ma_deviation",
            "long_window",
            "long_window must exceed short_window",
        ));
    }

    let threshold = parse_present::<f64>(config, "ma_deviation", "threshold")?
        .unwrap_or(defaults.threshold);
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(invalid(
            "ma_deviation",
            "threshold",
            "threshold must be positive",
        ));
    }
    Ok(())
}

fn validate_event_window(config: &dyn ConfigPort) -> Result<(), FundingError> {
    for key in ["before_hours", "after_hours"] {
        if let Some(value) = parse_present::<i64>(config, "events", key)? {
            if !(0..=MAX_WINDOW_HOURS).contains(&value) {
                return Err(invalid(
                    "events",
                    key,
                    format!("{key} must be between 0 and {MAX_WINDOW_HOURS}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_coin(config: &dyn ConfigPort) -> Result<(), FundingError> {
    if let Some(symbol) = config.get_string("backtest", "coin") {
        Coin::from_str(&symbol).map_err(|_| {
            invalid(
                "backtest",
                "coin",
                format!("unsupported coin '{}'", symbol.trim()),
            )
        })?;
    }
    Ok(())
}

fn validate_range(config: &dyn ConfigPort) -> Result<(), FundingError> {
    let start = parse_optional_timestamp(config, "start")?;
    let end = parse_optional_timestamp(config, "end")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid("backtest", "start", "start must be before end"));
        }
    }
    Ok(())
}

fn parse_optional_timestamp(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, FundingError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            invalid(
                "backtest",
                key,
                format!("invalid {key} timestamp, expected RFC 3339 or YYYY-MM-DD"),
            )
        }),
    }
}
