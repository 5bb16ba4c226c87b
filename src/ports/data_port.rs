//! Funding series loader port.
//!
//! Implementations own fetching, retries and any fallback policy; callers
//! receive either an ordered series or an error.

use chrono::{DateTime, Utc};

use crate::domain::error::FundingError;
use crate::domain::event::{Coin, TimeRange};
use crate::domain::rate_point::RatePoint;

pub trait DataPort {
    /// Points for `coin` with timestamps inside `range`, ascending.
    fn fetch_funding(&self, coin: Coin, range: &TimeRange) -> Result<Vec<RatePoint>, FundingError>;

    /// First timestamp, last timestamp and point count available for `coin`.
    fn data_range(
        &self,
        coin: Coin,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, FundingError>;
}
