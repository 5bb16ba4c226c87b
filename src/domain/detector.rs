//! Rolling Z-score anomaly detection over a funding-rate series.
//!
//! For every index `i >= window - 1` the mean and sample standard deviation of
//! the trailing `window` rates ending at `i` (inclusive) are computed, and
//! `z = (rate[i] - mean) / std`. Earlier indices have no statistics and hold.
//! A zero-variance window scores 0, as does a window whose statistics
//! overflow `f64`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::FundingError;
use super::rate_point::{RatePoint, validate_series};
use super::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub window: usize,
    pub threshold: f64,
}

impl DetectorConfig {
    pub fn new(window: usize, threshold: f64) -> Result<Self, FundingError> {
        let config = DetectorConfig { window, threshold };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FundingError> {
        if self.window < 2 {
            return Err(FundingError::configuration(
                "window",
                format!("window must be at least 2, got {}", self.window),
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(FundingError::configuration(
                "threshold",
                format!("threshold must be a positive number, got {}", self.threshold),
            ));
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            window: 20,
            threshold: 2.0,
        }
    }
}

/// A rate observation annotated with its rolling statistics and signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPoint {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
    pub price: Option<f64>,
    pub rolling_mean: Option<f64>,
    pub rolling_std: Option<f64>,
    pub z_score: Option<f64>,
    pub signal: Signal,
}

impl AnomalyPoint {
    pub fn is_anomaly(&self) -> bool {
        self.signal.is_entry()
    }

    /// |z|, or 0 before the window fills.
    pub fn signal_strength(&self) -> f64 {
        self.z_score.map(f64::abs).unwrap_or(0.0)
    }
}

/// Annotate `series` with rolling statistics and signals.
///
/// Configuration is checked before the series is inspected. Output has the
/// same length and order as the input.
pub fn detect(
    series: &[RatePoint],
    config: &DetectorConfig,
) -> Result<Vec<AnomalyPoint>, FundingError> {
    config.validate()?;
    validate_series(series)?;

    let window = config.window;
    let mut points = Vec::with_capacity(series.len());

    for (i, point) in series.iter().enumerate() {
        let stats = if i + 1 >= window {
            Some(window_stats(&series[i + 1 - window..=i]))
        } else {
            None
        };

        let (rolling_mean, rolling_std, z_score) = match stats {
            // Statistics that overflow are treated like a zero-variance window.
            Some((mean, std)) if !mean.is_finite() || !std.is_finite() => {
                (None, None, Some(0.0))
            }
            Some((mean, std)) => {
                let z = if std == 0.0 {
                    0.0
                } else {
                    (point.rate - mean) / std
                };
                let z = if z.is_finite() { z } else { 0.0 };
                (Some(mean), Some(std), Some(z))
            }
            None => (None, None, None),
        };

        points.push(AnomalyPoint {
            timestamp: point.timestamp,
            rate: point.rate,
            price: point.price,
            rolling_mean,
            rolling_std,
            z_score,
            signal: Signal::from_z_score(z_score, config.threshold),
        });
    }

    Ok(points)
}

/// Mean and sample standard deviation of the window's rates.
///
/// Values are shifted by the first element before summing so that a constant
/// window yields exactly zero variance.
fn window_stats(window: &[RatePoint]) -> (f64, f64) {
    let n = window.len() as f64;
    let origin = window[0].rate;

    let shifted_mean = window.iter().map(|p| p.rate - origin).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|p| {
            let diff = p.rate - origin - shifted_mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    (origin + shifted_mean, variance.sqrt())
}

/// Counts of signals fired across an annotated series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalStats {
    pub total_points: usize,
    pub evaluated_points: usize,
    pub long_signals: usize,
    pub short_signals: usize,
    /// Share of points carrying a LONG or SHORT signal; `None` for an empty series.
    pub signal_frequency: Option<f64>,
}

impl SignalStats {
    pub fn from_points(points: &[AnomalyPoint]) -> Self {
        Self::from_signals(points.iter().map(|p| (p.signal, p.z_score.is_some())))
    }

    /// Tally `(signal, evaluated)` pairs, one per series point.
    pub fn from_signals(signals: impl IntoIterator<Item = (Signal, bool)>) -> Self {
        let mut stats = SignalStats {
            total_points: 0,
            evaluated_points: 0,
            long_signals: 0,
            short_signals: 0,
            signal_frequency: None,
        };

        for (signal, evaluated) in signals {
            stats.total_points += 1;
            if evaluated {
                stats.evaluated_points += 1;
            }
            match signal {
                Signal::Long => stats.long_signals += 1,
                Signal::Short => stats.short_signals += 1,
                Signal::Hold => {}
            }
        }

        if stats.total_points > 0 {
            stats.signal_frequency =
                Some(stats.entry_signals() as f64 / stats.total_points as f64);
        }
        stats
    }

    pub fn entry_signals(&self) -> usize {
        self.long_signals + self.short_signals
    }
}
