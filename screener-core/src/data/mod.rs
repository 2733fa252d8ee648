//! Data layer: cache paths, snapshot store, providers, normalization, refresh.

pub mod cache_path;
pub mod circuit_breaker;
pub mod normalize;
pub mod provider;
pub mod refresh;
pub mod store;
pub mod synthetic;
pub mod yahoo;

pub use cache_path::{CacheLayout, SnapshotPath, DEFAULT_DATA_DIR};
pub use circuit_breaker::CircuitBreaker;
pub use normalize::{normalize, Alert, Normalized};
pub use provider::{
    DataError, MarketDataProvider, MarketFetch, RawQuote, RefreshProgress,
    SilentProgress, StdoutProgress,
};
pub use refresh::{refresh_market, RefreshError, RefreshSummary};
pub use store::{Freshness, SnapshotMeta, SnapshotStatus, SnapshotStore, StoreError};
pub use synthetic::SyntheticProvider;
pub use yahoo::{YahooProvider, YahooSettings};
