//! Domain types: markets, stock records, snapshots, and the tracked universe.

pub mod market;
pub mod record;
pub mod universe;

pub use market::{Market, UnknownMarket};
pub use record::{MarketSnapshot, SnapshotError, StockRecord, REFERENCE_MARKET_VOLATILITY_PCT};
pub use universe::{Listing, Universe};
