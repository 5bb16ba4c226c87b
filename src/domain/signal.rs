//! Discrete trading signal derived from a Z-score.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    Hold,
}

impl Signal {
    /// Funding unusually high (z > threshold) favours a short, unusually low
    /// favours a long. Both comparisons are strict; an undefined score holds.
    pub fn from_z_score(z_score: Option<f64>, threshold: f64) -> Self {
        match z_score {
            Some(z) if z > threshold => Signal::Short,
            Some(z) if z < -threshold => Signal::Long,
            _ => Signal::Hold,
        }
    }

    pub fn is_entry(self) -> bool {
        self != Signal::Hold
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::Long => "LONG",
            Signal::Short => "SHORT",
            Signal::Hold => "HOLD",
        };
        f.write_str(s)
    }
}
