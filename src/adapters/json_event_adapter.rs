//! JSON event catalog adapter.
//!
//! Reads an array of `{name, coin, timestamp, description?, category?, impact?}`
//! records. Missing descriptions default to empty, categories to `unknown` and
//! impact to `medium`.

use crate::domain::error::FundingError;
use crate::domain::event::{Coin, Impact, MarketEvent};
use crate::domain::rate_point::parse_timestamp;
use crate::ports::event_port::EventPort;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: String,
    coin: String,
    timestamp: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    impact: Option<Impact>,
}

impl RawEvent {
    fn into_event(self) -> Result<MarketEvent, FundingError> {
        let coin: Coin = self.coin.parse()?;
        let timestamp =
            parse_timestamp(&self.timestamp).ok_or_else(|| FundingError::DataSource {
                reason: format!(
                    "event '{}': invalid timestamp '{}'",
                    self.name, self.timestamp
                ),
            })?;

        Ok(MarketEvent {
            name: self.name,
            coin,
            timestamp,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_else(|| "unknown".to_string()),
            impact: self.impact.unwrap_or(Impact::Medium),
        })
    }
}

pub fn parse_events(content: &str) -> Result<Vec<MarketEvent>, FundingError> {
    let raw: Vec<RawEvent> =
        serde_json::from_str(content).map_err(|e| FundingError::DataSource {
            reason: format!("event catalog parse error: {e}"),
        })?;
    raw.into_iter().map(RawEvent::into_event).collect()
}

pub struct JsonEventCatalog {
    path: PathBuf,
}

impl JsonEventCatalog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl EventPort for JsonEventCatalog {
    fn list_events(&self) -> Result<Vec<MarketEvent>, FundingError> {
        let content = fs::read_to_string(&self.path).map_err(|e| FundingError::DataSource {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        parse_events(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::NamedTempFile;

    const CATALOG: &str = r#"[
        {
            "name": "Spot ETF Approval",
            "coin": "BTC",
            "timestamp": "2024-01-10T21:00:00",
            "description": "SEC approves spot bitcoin ETFs",
            "category": "regulation",
            "impact": "very_high"
        },
        {
            "name": "Dencun Upgrade",
            "coin": "eth",
            "timestamp": "2024-03-13T13:55:00Z"
        }
    ]"#;

    #[test]
    fn parses_full_and_minimal_records() {
        let events = parse_events(CATALOG).unwrap();
        assert_eq!(events.len(), 2);

        let etf = &events[0];
        assert_eq!(etf.coin, Coin::Btc);
        assert_eq!(
            etf.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 10, 21, 0, 0).unwrap()
        );
        assert_eq!(etf.impact, Impact::VeryHigh);
        assert_eq!(etf.category, "regulation");

        let dencun = &events[1];
        assert_eq!(dencun.coin, Coin::Eth);
        assert_eq!(dencun.description, "");
        assert_eq!(dencun.category, "unknown");
        assert_eq!(dencun.impact, Impact::Medium);
    }

    #[test]
    fn unsupported_coin_rejected() {
        let json = r#"[{"name": "x", "coin": "DOGE", "timestamp": "2024-01-01T00:00:00Z"}]"#;
        assert!(matches!(
            parse_events(json),
            Err(FundingError::UnsupportedCoin { .. })
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            parse_events("{not json"),
            Err(FundingError::DataSource { .. })
        ));
    }

    #[test]
    fn catalog_reads_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), CATALOG).unwrap();
        let catalog = JsonEventCatalog::new(file.path().to_path_buf());
        assert_eq!(catalog.list_events().unwrap().len(), 2);
    }
}
