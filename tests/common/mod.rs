#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use fundingscope::domain::backtest::BacktestConfig;
use fundingscope::domain::detector::DetectorConfig;
use fundingscope::domain::error::FundingError;
use fundingscope::domain::event::{Coin, Impact, MarketEvent, TimeRange};
use fundingscope::domain::rate_point::RatePoint;
use fundingscope::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<Coin, Vec<RatePoint>>,
    pub errors: HashMap<Coin, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_points(mut self, coin: Coin, points: Vec<RatePoint>) -> Self {
        self.data.insert(coin, points);
        self
    }

    pub fn with_error(mut self, coin: Coin, reason: &str) -> Self {
        self.errors.insert(coin, reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_funding(&self, coin: Coin, range: &TimeRange) -> Result<Vec<RatePoint>, FundingError> {
        if let Some(reason) = self.errors.get(&coin) {
            return Err(FundingError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(&coin)
            .map(|points| {
                points
                    .iter()
                    .copied()
                    .filter(|p| range.contains(p.timestamp))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn data_range(
        &self,
        coin: Coin,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FundingError> {
        if let Some(reason) = self.errors.get(&coin) {
            return Err(FundingError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(match self.data.get(&coin) {
            Some(points) if !points.is_empty() => Some((
                points[0].timestamp,
                points[points.len() - 1].timestamp,
                points.len(),
            )),
            _ => None,
        })
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Timestamp of the `i`-th 8-hourly settlement after `start()`.
pub fn ts(i: usize) -> DateTime<Utc> {
    start() + Duration::hours(8 * i as i64)
}

pub fn make_series(rates: &[f64]) -> Vec<RatePoint> {
    rates
        .iter()
        .enumerate()
        .map(|(i, &r)| RatePoint::new(ts(i), r))
        .collect()
}

pub fn make_priced_series(rates: &[f64], prices: &[f64]) -> Vec<RatePoint> {
    rates
        .iter()
        .zip(prices)
        .enumerate()
        .map(|(i, (&r, &p))| RatePoint::with_price(ts(i), r, p))
        .collect()
}

/// `len - 1` flat rates followed by one spike.
pub fn spike_series(len: usize, base: f64, spike: f64) -> Vec<RatePoint> {
    let mut rates = vec![base; len - 1];
    rates.push(spike);
    make_series(&rates)
}

pub fn config(window: usize, threshold: f64) -> BacktestConfig {
    BacktestConfig {
        detector: DetectorConfig::new(window, threshold).unwrap(),
        ..BacktestConfig::default()
    }
}

pub fn make_event(name: &str, coin: Coin, timestamp: DateTime<Utc>) -> MarketEvent {
    MarketEvent {
        name: name.to_string(),
        coin,
        timestamp,
        description: String::new(),
        category: "test".to_string(),
        impact: Impact::High,
    }
}
