//! Seeded synthetic quote provider.
//!
//! Produces plausible quotes without network access: a year of random-walk
//! closes plus fundamentals drawn from realistic ranges, with occasional gaps.
//! Each symbol gets its own sub-seed derived with BLAKE3 from the master seed
//! and the symbol, so a symbol's quote does not depend on which other symbols
//! were fetched or in what order.

use super::provider::{DataError, MarketDataProvider, RawQuote};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::ops::Range;

/// Number of daily closes generated per symbol.
pub const SYNTHETIC_HISTORY_DAYS: usize = 252;

/// Probability that any single fundamental is missing.
const GAP_PROBABILITY: f64 = 0.08;

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    master_seed: u64,
    failing: HashSet<String>,
}

impl SyntheticProvider {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            failing: HashSet::new(),
        }
    }

    /// Symbols that always fail with `SymbolNotFound`.
    pub fn with_failures<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// Deterministic sub-seed for a symbol.
    pub fn sub_seed(&self, symbol: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    fn rng_for(&self, symbol: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(symbol))
    }
}

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Draw from `range`, or `None` with probability `GAP_PROBABILITY`.
fn maybe(rng: &mut StdRng, range: Range<f64>) -> Option<f64> {
    if rng.gen_bool(GAP_PROBABILITY) {
        None
    } else {
        Some(rng.gen_range(range))
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, DataError> {
        if self.failing.contains(symbol) {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        let mut rng = self.rng_for(symbol);

        let start_price = rng.gen_range(5.0..400.0);
        let annual_vol = rng.gen_range(0.12..0.55);
        let annual_drift = rng.gen_range(-0.15..0.30);
        let daily_vol = annual_vol / (SYNTHETIC_HISTORY_DAYS as f64).sqrt();
        let daily_drift = annual_drift / SYNTHETIC_HISTORY_DAYS as f64;

        let mut closes = Vec::with_capacity(SYNTHETIC_HISTORY_DAYS);
        let mut price: f64 = start_price;
        for _ in 0..SYNTHETIC_HISTORY_DAYS {
            price *= (daily_drift + daily_vol * standard_normal(&mut rng)).exp();
            closes.push((price * 100.0).round() / 100.0);
        }
        let last = closes.last().copied().unwrap_or(start_price);

        let shares_outstanding = rng.gen_range(2.0e8..8.0e9);
        let pays_dividend = rng.gen_bool(0.7);
        let recommendation = ["strong_buy", "buy", "hold", "sell", "strong_sell"]
            [rng.gen_range(0..5)]
        .to_string();

        Ok(RawQuote {
            symbol: symbol.to_string(),
            name: None,
            sector: None,
            price: Some(last),
            market_cap: Some(last * shares_outstanding),
            trailing_pe: maybe(&mut rng, 4.0..60.0),
            forward_pe: maybe(&mut rng, 4.0..45.0),
            price_to_book: maybe(&mut rng, 0.4..12.0),
            return_on_equity: maybe(&mut rng, -0.10..0.45),
            return_on_assets: maybe(&mut rng, -0.05..0.20),
            profit_margin: maybe(&mut rng, -0.10..0.40),
            revenue_growth: maybe(&mut rng, -0.15..0.35),
            debt_to_equity: maybe(&mut rng, 10.0..250.0),
            dividend_yield: if pays_dividend {
                maybe(&mut rng, 0.005..0.08)
            } else {
                Some(0.0)
            },
            payout_ratio: maybe(&mut rng, 0.0..0.9),
            beta: maybe(&mut rng, 0.3..2.2),
            target_mean_price: maybe(&mut rng, 0.8..1.4).map(|f| last * f),
            num_analysts: Some(rng.gen_range(0..40)),
            recommendation: Some(recommendation),
            closes,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
