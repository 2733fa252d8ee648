//! Market data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over quote sources (Yahoo Finance,
//! the seeded synthetic generator) so the refresh path can be tested offline.

use crate::domain::{Listing, Market};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw per-symbol quote from a provider, before normalization.
///
/// Ratio fields (ROE, ROA, margins, growth, dividend yield, payout) are
/// fractions: 0.12 means 12%. `normalize` converts them to percent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub profit_margin: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub payout_ratio: Option<f64>,
    pub beta: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub num_analysts: Option<u32>,
    /// Consensus key such as `buy` or `strong_sell`.
    pub recommendation: Option<String>,
    /// Daily closes over roughly the last year, oldest first.
    pub closes: Vec<f64>,
}

/// Structured error types for provider operations.
///
/// Per-symbol and non-fatal: a refresh collects these and keeps going.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Per-symbol outcome of fetching a whole market.
#[derive(Debug)]
pub struct MarketFetch {
    pub quotes: Vec<(Listing, RawQuote)>,
    pub failures: Vec<(String, DataError)>,
}

/// Trait for quote providers.
///
/// Providers don't know about the snapshot store; the refresh orchestrator
/// sits between the two.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the current quote and last-year closes for a symbol.
    fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;

    /// Fetch every listing of a market, one symbol at a time.
    ///
    /// Failures are collected rather than aborting the batch. Once the provider
    /// reports itself unavailable the remaining symbols fail fast.
    fn fetch_market(
        &self,
        market: Market,
        listings: &[Listing],
        progress: &dyn RefreshProgress,
    ) -> MarketFetch {
        let total = listings.len();
        let mut quotes = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, listing) in listings.iter().enumerate() {
            progress.on_start(market, &listing.symbol, i, total);

            let result = if self.is_available() {
                self.fetch_quote(&listing.symbol)
            } else {
                Err(DataError::CircuitBreakerTripped)
            };

            match result {
                Ok(quote) => {
                    progress.on_complete(&listing.symbol, i, total, None);
                    quotes.push((listing.clone(), quote));
                }
                Err(e) => {
                    progress.on_complete(&listing.symbol, i, total, Some(&e));
                    failures.push((listing.symbol.clone(), e));
                }
            }
        }

        MarketFetch { quotes, failures }
    }
}

/// Progress callback for market refreshes.
pub trait RefreshProgress: Send {
    /// Called when starting to fetch a symbol.
    fn on_start(&self, market: Market, symbol: &str, index: usize, total: usize);

    /// Called when a symbol fetch completes; `error` is set on failure.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, error: Option<&DataError>);

    /// Called when the market's batch is done.
    fn on_batch_complete(&self, market: Market, succeeded: usize, failed: usize, total: usize);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl RefreshProgress for StdoutProgress {
    fn on_start(&self, market: Market, symbol: &str, index: usize, total: usize) {
        println!("[{market} {}/{}] Fetching {symbol}...", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, error: Option<&DataError>) {
        match error {
            None => println!("  OK: {symbol}"),
            Some(e) => println!("  FAIL: {symbol}: {e}"),
        }
    }

    fn on_batch_complete(&self, market: Market, succeeded: usize, failed: usize, total: usize) {
        println!("\n{market} refresh complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}

/// Progress reporter that prints nothing.
pub struct SilentProgress;

impl RefreshProgress for SilentProgress {
    fn on_start(&self, _market: Market, _symbol: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _error: Option<&DataError>) {}
    fn on_batch_complete(&self, _market: Market, _succeeded: usize, _failed: usize, _total: usize) {}
}
