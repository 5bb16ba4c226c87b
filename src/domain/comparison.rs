//! Alternative anomaly detectors and side-by-side signal comparison.
//!
//! Every detector scores the same series point by point. A comparison tallies
//! each detector's signals with [`SignalStats`] and averages the confidence
//! of the entry signals it fired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::detector::{DetectorConfig, SignalStats, detect};
use super::error::FundingError;
use super::rate_point::{RatePoint, validate_series};
use super::signal::Signal;

/// One detector's verdict on one series point.
///
/// `confidence` is `None` until the detector's window fills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub timestamp: DateTime<Utc>,
    pub signal: Signal,
    pub confidence: Option<f64>,
}

impl ScoredPoint {
    fn warmup(point: &RatePoint) -> Self {
        ScoredPoint {
            timestamp: point.timestamp,
            signal: Signal::Hold,
            confidence: None,
        }
    }
}

pub trait SignalDetector {
    fn name(&self) -> &str;

    /// Score every point of `series`, in order.
    fn score(&self, series: &[RatePoint]) -> Result<Vec<ScoredPoint>, FundingError>;
}

impl SignalDetector for DetectorConfig {
    fn name(&self) -> &str {
        "zscore"
    }

    /// Confidence is |z| over the threshold.
    fn score(&self, series: &[RatePoint]) -> Result<Vec<ScoredPoint>, FundingError> {
        let threshold = self.threshold;
        Ok(detect(series, self)?
            .into_iter()
            .map(|p| ScoredPoint {
                timestamp: p.timestamp,
                signal: p.signal,
                confidence: p.z_score.map(|z| z.abs() / threshold),
            })
            .collect())
    }
}

/// Flags rates outside the trailing window's percentile band.
///
/// A rate above the upper percentile shorts, one below the lower percentile
/// longs. Confidence is the excess beyond the band, in units of the distance
/// between that band edge and the window median.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileDetector {
    pub window: usize,
    pub lower_pct: f64,
    pub upper_pct: f64,
}

impl PercentileDetector {
    pub fn new(window: usize, lower_pct: f64, upper_pct: f64) -> Result<Self, FundingError> {
        let detector = PercentileDetector {
            window,
            lower_pct,
            upper_pct,
        };
        detector.validate()?;
        Ok(detector)
    }

    pub fn validate(&self) -> Result<(), FundingError> {
        if self.window < 2 {
            return Err(FundingError::configuration(
                "percentile.window",
                format!("window must be at least 2, got {}", self.window),
            ));
        }
        let in_range = |p: f64| p.is_finite() && (0.0..=100.0).contains(&p);
        if !in_range(self.lower_pct) || !in_range(self.upper_pct) || self.lower_pct >= self.upper_pct
        {
            return Err(FundingError::configuration(
                "percentile.bounds",
                format!(
                    "need 0 <= lower_pct < upper_pct <= 100, got {} and {}",
                    self.lower_pct, self.upper_pct
                ),
            ));
        }
        Ok(())
    }
}

impl Default for PercentileDetector {
    fn default() -> Self {
        PercentileDetector {
            window: 20,
            lower_pct: 5.0,
            upper_pct: 95.0,
        }
    }
}

impl SignalDetector for PercentileDetector {
    fn name(&self) -> &str {
        "percentile"
    }

    fn score(&self, series: &[RatePoint]) -> Result<Vec<ScoredPoint>, FundingError> {
        self.validate()?;
        validate_series(series)?;

        let mut scored = Vec::with_capacity(series.len());
        for (i, point) in series.iter().enumerate() {
            if i + 1 < self.window {
                scored.push(ScoredPoint::warmup(point));
                continue;
            }

            let mut sorted: Vec<f64> = series[i + 1 - self.window..=i]
                .iter()
                .map(|p| p.rate)
                .collect();
            sorted.sort_by(f64::total_cmp);
            let upper = quantile(&sorted, self.upper_pct / 100.0);
            let lower = quantile(&sorted, self.lower_pct / 100.0);
            let median = quantile(&sorted, 0.5);

            let (signal, confidence) = if point.rate > upper {
                (Signal::Short, ratio(point.rate - upper, upper - median))
            } else if point.rate < lower {
                (Signal::Long, ratio(lower - point.rate, median - lower))
            } else {
                (Signal::Hold, 0.0)
            };

            scored.push(ScoredPoint {
                timestamp: point.timestamp,
                signal,
                confidence: Some(confidence),
            });
        }
        Ok(scored)
    }
}

/// Flags a short moving average drifting away from a long one.
///
/// The deviation is `(ma_short - ma_long) / |ma_long|` in percent. Above
/// `threshold` shorts, below `-threshold` longs. Confidence is |deviation|
/// over the threshold. A zero long average scores 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaDeviationDetector {
    pub short_window: usize,
    pub long_window: usize,
    pub threshold: f64,
}

impl MaDeviationDetector {
    pub fn new(
        short_window: usize,
        long_window: usize,
        threshold: f64,
    ) -> Result<Self, FundingError> {
        let detector = MaDeviationDetector {
            short_window,
            long_window,
            threshold,
        };
        detector.validate()?;
        Ok(detector)
    }

    pub fn validate(&self) -> Result<(), FundingError> {
        if self.short_window < 1 || self.long_window <= self.short_window {
            return Err(FundingError::configuration(
                "ma_deviation.windows",
                format!(
                    "need 1 <= short_window < long_window, got {} and {}",
                    self.short_window, self.long_window
                ),
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(FundingError::configuration(
                "ma_deviation.threshold",
                format!("threshold must be a positive number, got {}", self.threshold),
            ));
        }
        Ok(())
    }
}

impl Default for MaDeviationDetector {
    fn default() -> Self {
        MaDeviationDetector {
            short_window: 1,
            long_window: 3,
            threshold: 50.0,
        }
    }
}

impl SignalDetector for MaDeviationDetector {
    fn name(&self) -> &str {
        "ma_deviation"
    }

    fn score(&self, series: &[RatePoint]) -> Result<Vec<ScoredPoint>, FundingError> {
        self.validate()?;
        validate_series(series)?;

        let mut scored = Vec::with_capacity(series.len());
        for (i, point) in series.iter().enumerate() {
            if i + 1 < self.long_window {
                scored.push(ScoredPoint::warmup(point));
                continue;
            }

            let ma_short = mean(&series[i + 1 - self.short_window..=i]);
            let ma_long = mean(&series[i + 1 - self.long_window..=i]);
            let deviation = if ma_long == 0.0 {
                0.0
            } else {
                (ma_short - ma_long) / ma_long.abs() * 100.0
            };
            let deviation = if deviation.is_finite() { deviation } else { 0.0 };

            let signal = if deviation > self.threshold {
                Signal::Short
            } else if deviation < -self.threshold {
                Signal::Long
            } else {
                Signal::Hold
            };

            scored.push(ScoredPoint {
                timestamp: point.timestamp,
                signal,
                confidence: Some(deviation.abs() / self.threshold),
            });
        }
        Ok(scored)
    }
}

/// Linearly interpolated quantile of an ascending, non-empty slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn ratio(excess: f64, spread: f64) -> f64 {
    if spread > 0.0 {
        let r = excess / spread;
        if r.is_finite() { r } else { 0.0 }
    } else {
        0.0
    }
}

fn mean(window: &[RatePoint]) -> f64 {
    window.iter().map(|p| p.rate).sum::<f64>() / window.len() as f64
}

/// How one detector behaved over a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorComparison {
    pub name: String,
    pub stats: SignalStats,
    /// Mean confidence over LONG and SHORT points; `None` when none fired.
    pub avg_confidence: Option<f64>,
    pub long_share: Option<f64>,
    pub short_share: Option<f64>,
}

impl DetectorComparison {
    pub fn from_scored(name: &str, scored: &[ScoredPoint]) -> Self {
        let stats =
            SignalStats::from_signals(scored.iter().map(|p| (p.signal, p.confidence.is_some())));

        let confidences: Vec<f64> = scored
            .iter()
            .filter(|p| p.signal.is_entry())
            .filter_map(|p| p.confidence)
            .collect();
        let avg_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };

        let entries = stats.entry_signals();
        let share = |count: usize| (entries > 0).then(|| count as f64 / entries as f64);

        DetectorComparison {
            name: name.to_string(),
            stats,
            avg_confidence,
            long_share: share(stats.long_signals),
            short_share: share(stats.short_signals),
        }
    }
}

/// Run every detector over `series` and summarise each one's signals.
pub fn compare_detectors(
    series: &[RatePoint],
    detectors: &[&dyn SignalDetector],
) -> Result<Vec<DetectorComparison>, FundingError> {
    validate_series(series)?;

    detectors
        .iter()
        .map(|detector| {
            let scored = detector.score(series)?;
            if scored.len() != series.len() {
                return Err(FundingError::InconsistentData {
                    reason: format!(
                        "detector {} scored {} of {} points",
                        detector.name(),
                        scored.len(),
                        series.len()
                    ),
                });
            }
            Ok(DetectorComparison::from_scored(detector.name(), &scored))
        })
        .collect()
}
