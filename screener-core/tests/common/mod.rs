//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use screener_core::domain::{Market, MarketSnapshot, StockRecord};
use screener_core::{Screener, ScreenerConfig};
use screener_core::domain::Universe;
use std::path::Path;

pub const SECTORS: [&str; 5] = ["Banking", "Energy", "Utilities", "Technology", "Industrial"];

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
}

/// A record that passes every default filter.
pub fn well_behaved(market: Market, i: usize) -> StockRecord {
    let mut r = StockRecord::new(
        format!("SYM{i:02}"),
        format!("Company {i}"),
        market,
        SECTORS[i % SECTORS.len()],
        10.0 + i as f64,
        (2 + i) as f64 * 1e9,
    );
    r.pe_ratio = Some(8.0 + i as f64);
    r.roe = Some(5.0 + i as f64 / 2.0);
    r.roa = Some(2.0 + i as f64 / 10.0);
    r.dividend_yield = Some((i % 6) as f64);
    r.beta = Some(0.8 + (i % 5) as f64 / 10.0);
    r.total_return_1y = Some(i as f64 - 10.0);
    r.upside_pct = Some(i as f64 - 5.0);
    r.volatility_pct = Some(15.0 + i as f64);
    r.num_analysts = Some((i % 25) as u32);
    r.score = Some((40 + i) as u8);
    r
}

pub fn well_behaved_records(market: Market, n: usize) -> Vec<StockRecord> {
    (0..n).map(|i| well_behaved(market, i)).collect()
}

pub fn snapshot(market: Market, records: Vec<StockRecord>) -> MarketSnapshot {
    MarketSnapshot::new(market, fixed_now(), records).unwrap()
}

pub fn screener(dir: &Path) -> Screener {
    let config = ScreenerConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    };
    Screener::new(config, Universe::builtin())
}
