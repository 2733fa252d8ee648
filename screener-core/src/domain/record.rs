//! Stock records and market snapshots.

use super::market::Market;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Fallback market volatility (%) used to turn a beta into a volatility estimate
/// when no price history was available.
pub const REFERENCE_MARKET_VOLATILITY_PCT: f64 = 20.0;

/// One row per ticker symbol per market.
///
/// Optional fields are upstream data gaps. They stay `None` all the way to the
/// screen; `Some(0.0)` is a real value (e.g. a stock that pays no dividend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub sector: String,
    pub price: f64,
    /// Market capitalization in the market's currency.
    pub market_cap: f64,
    pub pe_ratio: Option<f64>,
    /// Return on equity, percent.
    pub roe: Option<f64>,
    /// Return on assets, percent.
    pub roa: Option<f64>,
    /// Net profit margin, percent.
    pub profit_margin: Option<f64>,
    pub debt_to_equity: Option<f64>,
    /// Dividend yield, percent.
    pub dividend_yield: Option<f64>,
    /// Payout ratio, percent.
    pub payout_ratio: Option<f64>,
    pub beta: Option<f64>,
    /// Realized price change over the last year, percent.
    pub total_return_1y: Option<f64>,
    /// Distance from price to the analyst mean target, percent.
    pub upside_pct: Option<f64>,
    /// Annualized realized volatility of daily returns, percent.
    pub volatility_pct: Option<f64>,
    pub num_analysts: Option<u32>,
    /// Attractiveness score, 0-100.
    pub score: Option<u8>,
}

impl StockRecord {
    /// Minimal record with every optional field empty.
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        market: Market,
        sector: impl Into<String>,
        price: f64,
        market_cap: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
            sector: sector.into(),
            price,
            market_cap,
            pe_ratio: None,
            roe: None,
            roa: None,
            profit_margin: None,
            debt_to_equity: None,
            dividend_yield: None,
            payout_ratio: None,
            beta: None,
            total_return_1y: None,
            upside_pct: None,
            volatility_pct: None,
            num_analysts: None,
            score: None,
        }
    }

    /// Market cap in billions of the market's currency.
    pub fn market_cap_billions(&self) -> f64 {
        self.market_cap / 1e9
    }

    /// Expected one-year return: upside plus dividend yield.
    ///
    /// `None` when upside is unknown. A missing dividend contributes nothing.
    pub fn expected_return(&self) -> Option<f64> {
        self.upside_pct
            .map(|upside| upside + self.dividend_yield.unwrap_or(0.0))
    }

    /// Measured volatility, or a beta-scaled estimate when history was missing.
    pub fn effective_volatility(&self) -> Option<f64> {
        self.volatility_pct
            .or_else(|| self.beta.map(|b| b.abs() * REFERENCE_MARKET_VOLATILITY_PCT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("duplicate symbol '{symbol}' in {market} snapshot")]
    DuplicateSymbol { symbol: String, market: Market },

    #[error("record '{symbol}' belongs to {found}, not {expected}")]
    ForeignRecord {
        symbol: String,
        expected: Market,
        found: Market,
    },
}

/// Every record of one market as of one refresh.
///
/// Built whole and never edited in place: a refresh produces a new snapshot
/// that replaces the old one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    market: Market,
    refreshed_at: DateTime<Utc>,
    records: Vec<StockRecord>,
}

impl MarketSnapshot {
    /// Validates that every record belongs to `market` and symbols are unique.
    pub fn new(
        market: Market,
        refreshed_at: DateTime<Utc>,
        records: Vec<StockRecord>,
    ) -> Result<Self, SnapshotError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.market != market {
                return Err(SnapshotError::ForeignRecord {
                    symbol: record.symbol.clone(),
                    expected: market,
                    found: record.market,
                });
            }
            if !seen.insert(record.symbol.as_str()) {
                return Err(SnapshotError::DuplicateSymbol {
                    symbol: record.symbol.clone(),
                    market,
                });
            }
        }

        Ok(Self {
            market,
            refreshed_at,
            records,
        })
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    pub fn records(&self) -> &[StockRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&StockRecord> {
        self.records.iter().find(|r| r.symbol == symbol)
    }

    /// BLAKE3 hash over the serialized records, used to detect unchanged refreshes.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.records).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}
