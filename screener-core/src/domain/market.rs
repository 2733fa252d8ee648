//! Supported markets and their canonical keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the exchanges/indices the screener tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Market {
    Ibex35,
    MediumCapSpain,
    Sp500,
    Nasdaq,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown market '{0}' (expected one of: IBEX35, MEDIUM_CAP_SPAIN, SP500, NASDAQ)")]
pub struct UnknownMarket(pub String);

impl Market {
    pub const ALL: [Market; 4] = [
        Market::Ibex35,
        Market::MediumCapSpain,
        Market::Sp500,
        Market::Nasdaq,
    ];

    /// Canonical key, stable across releases. Stored in snapshot files.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ibex35 => "IBEX35",
            Self::MediumCapSpain => "MEDIUM_CAP_SPAIN",
            Self::Sp500 => "SP500",
            Self::Nasdaq => "NASDAQ",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ibex35 => "IBEX 35",
            Self::MediumCapSpain => "Spain Medium Cap",
            Self::Sp500 => "S&P 500 Top 25",
            Self::Nasdaq => "NASDAQ Top 25",
        }
    }

    /// File stem used by the cache layout. Only `CacheLayout` should read this.
    pub(crate) fn file_stem(&self) -> &'static str {
        match self {
            Self::Ibex35 => "ibex35",
            Self::MediumCapSpain => "spain_medium_cap",
            Self::Sp500 => "sp500_top25",
            Self::Nasdaq => "nasdaq_top25",
        }
    }

    /// Reporting currency of the listed prices.
    pub fn currency(&self) -> &'static str {
        match self {
            Self::Ibex35 | Self::MediumCapSpain => "EUR",
            Self::Sp500 | Self::Nasdaq => "USD",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

impl FromStr for Market {
    type Err = UnknownMarket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "IBEX35" | "IBEX" => Ok(Self::Ibex35),
            "MEDIUMCAPSPAIN" | "MEDIUMCAP" | "SPAINMEDIUMCAP" | "CONTINUO" | "SPCONTINUO" => {
                Ok(Self::MediumCapSpain)
            }
            "SP500" | "SP500TOP25" | "SANDP500" => Ok(Self::Sp500),
            "NASDAQ" | "NASDAQTOP25" | "NDX" | "NDX25" => Ok(Self::Nasdaq),
            _ => Err(UnknownMarket(s.to_string())),
        }
    }
}
