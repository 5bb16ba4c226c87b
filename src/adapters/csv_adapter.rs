//! CSV file funding-series adapter.
//!
//! One file per coin, `<base>/<COIN>.csv`, with a header row. Recognised
//! columns: `timestamp` (or `time`), `rate` (or `funding_rate` /
//! `fundingRate`) and an optional `price`.

use crate::domain::error::FundingError;
use crate::domain::event::{Coin, TimeRange};
use crate::domain::rate_point::{RatePoint, parse_timestamp};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    timestamp: usize,
    rate: usize,
    price: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, coin: Coin) -> PathBuf {
        self.base_path.join(format!("{}.csv", coin.symbol()))
    }

    fn read_all(&self, coin: Coin) -> Result<Vec<RatePoint>, FundingError> {
        let path = self.csv_path(coin);
        let content = fs::read_to_string(&path).map_err(|e| FundingError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| FundingError::DataSource {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let columns = locate_columns(headers)?;

        let mut points = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| FundingError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            points.push(parse_record(&record, &columns, line + 2)?);
        }

        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

fn locate_columns(headers: &csv::StringRecord) -> Result<Columns, FundingError> {
    let timestamp = find_column(headers, &["timestamp", "time"]).ok_or_else(|| {
        FundingError::DataSource {
            reason: "missing timestamp column".into(),
        }
    })?;
    let rate = find_column(headers, &["rate", "funding_rate", "fundingrate"]).ok_or_else(|| {
        FundingError::DataSource {
            reason: "missing rate column".into(),
        }
    })?;

    Ok(Columns {
        timestamp,
        rate,
        price: find_column(headers, &["price"]),
    })
}

fn parse_record(
    record: &csv::StringRecord,
    columns: &Columns,
    line: usize,
) -> Result<RatePoint, FundingError> {
    let raw_ts = record
        .get(columns.timestamp)
        .ok_or_else(|| FundingError::DataSource {
            reason: format!("line {line}: missing timestamp"),
        })?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| FundingError::DataSource {
        reason: format!("line {line}: invalid timestamp '{raw_ts}'"),
    })?;

    let rate: f64 = record
        .get(columns.rate)
        .ok_or_else(|| FundingError::DataSource {
            reason: format!("line {line}: missing rate"),
        })?
        .trim()
        .parse()
        .map_err(|e| FundingError::DataSource {
            reason: format!("line {line}: invalid rate value: {e}"),
        })?;

    let price = match columns.price.and_then(|i| record.get(i)).map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<f64>().map_err(|e| FundingError::DataSource {
            reason: format!("line {line}: invalid price value: {e}"),
        })?),
    };

    Ok(RatePoint {
        timestamp,
        rate,
        price,
    })
}

impl DataPort for CsvAdapter {
    fn fetch_funding(
        &self,
        coin: Coin,
        range: &TimeRange,
    ) -> Result<Vec<RatePoint>, FundingError> {
        let mut points = self.read_all(coin)?;
        points.retain(|p| range.contains(p.timestamp));
        Ok(points)
    }

    fn data_range(
        &self,
        coin: Coin,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FundingError> {
        if !self.csv_path(coin).exists() {
            return Ok(None);
        }
        let points = self.read_all(coin)?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp, points.len())),
            _ => None,
        })
    }
}
