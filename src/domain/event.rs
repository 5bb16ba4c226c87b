//! Market events and supported coins.
//!
//! An event only selects the time range fed to the series loader; detection
//! and simulation never look at it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::FundingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Coin {
    Btc,
    Eth,
    Sol,
    Bnb,
}

impl Coin {
    pub const ALL: [Coin; 4] = [Coin::Btc, Coin::Eth, Coin::Sol, Coin::Bnb];

    pub fn symbol(self) -> &'static str {
        match self {
            Coin::Btc => "BTC",
            Coin::Eth => "ETH",
            Coin::Sol => "SOL",
            Coin::Bnb => "BNB",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Coin {
    type Err = FundingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Coin::ALL
            .into_iter()
            .find(|c| c.symbol() == upper)
            .ok_or(FundingError::UnsupportedCoin {
                symbol: s.trim().to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Impact::Low => "low",
            Impact::Medium => "medium",
            Impact::High => "high",
            Impact::VeryHigh => "very_high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub name: String,
    pub coin: Coin,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub category: String,
    pub impact: Impact,
}

impl MarketEvent {
    /// Range loaded around the event. Fails when either side of the window
    /// falls outside the representable timestamp range.
    pub fn time_range(&self, window: &EventWindow) -> Result<TimeRange, FundingError> {
        let start = Duration::try_hours(window.before_hours)
            .and_then(|d| self.timestamp.checked_sub_signed(d));
        let end = Duration::try_hours(window.after_hours)
            .and_then(|d| self.timestamp.checked_add_signed(d));

        match (start, end) {
            (Some(start), Some(end)) if start <= end => Ok(TimeRange { start, end }),
            _ => Err(FundingError::invalid_input(format!(
                "event window -{}h/+{}h around {} is out of range",
                window.before_hours, window.after_hours, self.timestamp
            ))),
        }
    }
}

/// Largest accepted span, in hours, on either side of an event (ten years).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365 * 10;

/// Hours of history loaded around an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    pub before_hours: i64,
    pub after_hours: i64,
}

impl Default for EventWindow {
    fn default() -> Self {
        EventWindow {
            before_hours: 24,
            after_hours: 72,
        }
    }
}

/// Inclusive time range requested from a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, FundingError> {
        if start >= end {
            return Err(FundingError::invalid_input(format!(
                "range start {start} must precede end {end}"
            )));
        }
        Ok(TimeRange { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

pub fn find_event<'a>(events: &'a [MarketEvent], name: &str) -> Result<&'a MarketEvent, FundingError> {
    events
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| FundingError::UnknownEvent {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> MarketEvent {
        MarketEvent {
            name: "ETF Approval".into(),
            coin: Coin::Btc,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 21, 0, 0).unwrap(),
            description: "Spot ETF approved".into(),
            category: "regulation".into(),
            impact: Impact::VeryHigh,
        }
    }

    #[test]
    fn coin_parse_case_insensitive() {
        assert_eq!("btc".parse::<Coin>().unwrap(), Coin::Btc);
        assert_eq!(" ETH ".parse::<Coin>().unwrap(), Coin::Eth);
        assert_eq!("Sol".parse::<Coin>().unwrap(), Coin::Sol);
        assert_eq!("BNB".parse::<Coin>().unwrap(), Coin::Bnb);
    }

    #[test]
    fn coin_parse_unsupported() {
        let err = "DOGE".parse::<Coin>().unwrap_err();
        assert!(matches!(err, FundingError::UnsupportedCoin { ref symbol } if symbol == "DOGE"));
    }

    #[test]
    fn default_window_range() {
        let event = sample_event();
        let range = event.time_range(&EventWindow::default()).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 1, 9, 21, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 1, 13, 21, 0, 0).unwrap());
        assert!(range.contains(event.timestamp));
    }

    #[test]
    fn oversized_window_is_error() {
        let event = sample_event();
        let window = EventWindow {
            before_hours: 10_000_000_000,
            after_hours: 72,
        };
        assert!(matches!(
            event.time_range(&window),
            Err(FundingError::InvalidInput { .. })
        ));

        let window = EventWindow {
            before_hours: 24,
            after_hours: i64::MAX,
        };
        assert!(event.time_range(&window).is_err());
    }

    #[test]
    fn negative_window_collapsing_range_is_error() {
        let window = EventWindow {
            before_hours: -48,
            after_hours: 0,
        };
        assert!(sample_event().time_range(&window).is_err());
    }

    #[test]
    fn time_range_requires_order() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeRange::new(t, t).is_err());
        assert!(TimeRange::new(t, t + Duration::hours(1)).is_ok());
    }

    #[test]
    fn find_event_by_name() {
        let events = vec![sample_event()];
        assert_eq!(find_event(&events, "etf approval").unwrap().coin, Coin::Btc);
        assert!(matches!(
            find_event(&events, "Halving"),
            Err(FundingError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn impact_serde_names() {
        let json = serde_json::to_string(&Impact::VeryHigh).unwrap();
        assert_eq!(json, "\"very_high\"");
        assert_eq!(Impact::Medium.to_string(), "medium");
    }
}
