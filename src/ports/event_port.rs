//! Event catalog port.

use crate::domain::error::FundingError;
use crate::domain::event::MarketEvent;

pub trait EventPort {
    fn list_events(&self) -> Result<Vec<MarketEvent>, FundingError>;
}
