//! Funding-rate observations and series validation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::error::FundingError;

/// One funding settlement: the rate paid at `timestamp`, optionally with the
/// mark price at the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
    pub price: Option<f64>,
}

impl RatePoint {
    pub fn new(timestamp: DateTime<Utc>, rate: f64) -> Self {
        RatePoint {
            timestamp,
            rate,
            price: None,
        }
    }

    pub fn with_price(timestamp: DateTime<Utc>, rate: f64, price: f64) -> Self {
        RatePoint {
            timestamp,
            rate,
            price: Some(price),
        }
    }
}

/// What a trade is valued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueBasis {
    /// No prices supplied: entry and exit values are funding rates.
    Rate,
    /// Every point carries a price: values are prices and funding accrues.
    Price,
}

/// Validate an ordered series of `(timestamp, rate, price)` triples.
///
/// Timestamps must be strictly increasing, rates and prices finite, and
/// prices present on either all points or none. Returns the value basis the
/// series supports; an empty series is valued on rate.
pub fn validate_points<I>(points: I) -> Result<ValueBasis, FundingError>
where
    I: IntoIterator<Item = (DateTime<Utc>, f64, Option<f64>)>,
{
    let mut prev: Option<DateTime<Utc>> = None;
    let mut basis: Option<ValueBasis> = None;

    for (i, (timestamp, rate, price)) in points.into_iter().enumerate() {
        if let Some(p) = prev {
            if timestamp == p {
                return Err(FundingError::invalid_input(format!(
                    "duplicate timestamp {timestamp} at index {i}"
                )));
            }
            if timestamp < p {
                return Err(FundingError::invalid_input(format!(
                    "timestamp {timestamp} at index {i} precedes {p}"
                )));
            }
        }
        prev = Some(timestamp);

        if !rate.is_finite() {
            return Err(FundingError::invalid_input(format!(
                "non-finite rate at index {i}"
            )));
        }

        let point_basis = match price {
            Some(p) if !p.is_finite() => {
                return Err(FundingError::invalid_input(format!(
                    "non-finite price at index {i}"
                )));
            }
            Some(_) => ValueBasis::Price,
            None => ValueBasis::Rate,
        };
        match basis {
            None => basis = Some(point_basis),
            Some(b) if b != point_basis => {
                return Err(FundingError::invalid_input(format!(
                    "price missing on some points (first mismatch at index {i})"
                )));
            }
            Some(_) => {}
        }
    }

    Ok(basis.unwrap_or(ValueBasis::Rate))
}

/// Validate a loader-supplied series.
pub fn validate_series(series: &[RatePoint]) -> Result<ValueBasis, FundingError> {
    validate_points(series.iter().map(|p| (p.timestamp, p.rate, p.price)))
}

/// Parse a timestamp as RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` /
/// `YYYY-MM-DD HH:MM:SS` (taken as UTC), a bare date, or epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Annualise a per-settlement funding rate.
pub fn annualized_funding(rate: f64, periods_per_day: f64) -> f64 {
    rate * periods_per_day * 365.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    #[test]
    fn empty_series_is_valid() {
        assert_eq!(validate_series(&[]).unwrap(), ValueBasis::Rate);
    }

    #[test]
    fn rate_only_series() {
        let series = vec![RatePoint::new(ts(0), 0.01), RatePoint::new(ts(8), 0.02)];
        assert_eq!(validate_series(&series).unwrap(), ValueBasis::Rate);
    }

    #[test]
    fn priced_series() {
        let series = vec![
            RatePoint::with_price(ts(0), 0.01, 100.0),
            RatePoint::with_price(ts(8), 0.02, 101.0),
        ];
        assert_eq!(validate_series(&series).unwrap(), ValueBasis::Price);
    }

    #[test]
    fn irregular_spacing_is_valid() {
        let series = vec![
            RatePoint::new(ts(0), 0.01),
            RatePoint::new(ts(1), 0.02),
            RatePoint::new(ts(30), 0.03),
        ];
        assert!(validate_series(&series).is_ok());
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let series = vec![RatePoint::new(ts(0), 0.01), RatePoint::new(ts(0), 0.02)];
        let err = validate_series(&series).unwrap_err();
        assert!(matches!(err, FundingError::InvalidInput { .. }));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn decreasing_timestamp_rejected() {
        let series = vec![RatePoint::new(ts(8), 0.01), RatePoint::new(ts(0), 0.02)];
        assert!(matches!(
            validate_series(&series),
            Err(FundingError::InvalidInput { .. })
        ));
    }

    #[test]
    fn non_finite_values_rejected() {
        let series = vec![RatePoint::new(ts(0), f64::NAN)];
        assert!(validate_series(&series).is_err());

        let series = vec![RatePoint::with_price(ts(0), 0.01, f64::INFINITY)];
        assert!(validate_series(&series).is_err());
    }

    #[test]
    fn mixed_price_presence_rejected() {
        let series = vec![
            RatePoint::with_price(ts(0), 0.01, 100.0),
            RatePoint::new(ts(8), 0.02),
        ];
        let err = validate_series(&series).unwrap_err();
        assert!(err.to_string().contains("price missing"));
    }

    #[test]
    fn parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-05T08:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05 08:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp(&expected.timestamp_millis().to_string()),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn annualized_funding_three_settlements() {
        // 0.01% per 8h => 10.95% per year
        assert!((annualized_funding(0.01, 3.0) - 10.95).abs() < 1e-9);
    }
}
