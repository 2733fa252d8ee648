//! Refresh orchestrator: fetch every symbol of a market, normalize, save.
//!
//! Per-symbol failures are collected and reported; the refresh fails only when
//! nothing at all could be fetched. In that case the previous snapshot stays
//! on disk untouched.

use super::normalize::{normalize, Alert};
use super::provider::{DataError, MarketDataProvider, RefreshProgress};
use super::store::{SnapshotMeta, SnapshotStore, StoreError};
use crate::domain::{Market, MarketSnapshot, SnapshotError, Universe};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no symbols configured for {market}")]
    NoListings { market: Market },

    #[error("refresh of {market} fetched nothing ({} symbols failed)", failures.len())]
    NothingFetched {
        market: Market,
        failures: Vec<(String, DataError)>,
    },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful market refresh.
#[derive(Debug)]
pub struct RefreshSummary {
    pub market: Market,
    pub total: usize,
    pub saved: usize,
    pub failures: Vec<(String, DataError)>,
    pub alerts: Vec<Alert>,
    pub meta: SnapshotMeta,
    /// True when the new records hash the same as the previous snapshot's.
    pub unchanged: bool,
}

impl RefreshSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch, normalize and atomically replace one market's snapshot.
pub fn refresh_market(
    provider: &dyn MarketDataProvider,
    store: &SnapshotStore,
    universe: &Universe,
    market: Market,
    now: DateTime<Utc>,
    progress: &dyn RefreshProgress,
) -> Result<RefreshSummary, RefreshError> {
    let listings = universe.listings(market);
    if listings.is_empty() {
        return Err(RefreshError::NoListings { market });
    }
    let total = listings.len();

    info!(%market, provider = provider.name(), symbols = total, "refreshing market");
    let fetch = provider.fetch_market(market, listings, progress);
    let mut failures = fetch.failures;
    let mut alerts = Vec::new();
    let mut records = Vec::with_capacity(fetch.quotes.len());

    for (listing, quote) in &fetch.quotes {
        match normalize(market, listing, quote) {
            Ok(normalized) => {
                alerts.extend(normalized.alerts);
                records.push(normalized.record);
            }
            Err(e) => failures.push((listing.symbol.clone(), e)),
        }
    }

    for (symbol, error) in &failures {
        warn!(%market, symbol = symbol.as_str(), %error, "symbol skipped");
    }
    progress.on_batch_complete(market, records.len(), failures.len(), total);

    if records.is_empty() {
        return Err(RefreshError::NothingFetched { market, failures });
    }

    let previous_hash = store.meta(market).map(|m| m.data_hash);
    let snapshot = MarketSnapshot::new(market, now, records)?;
    let meta = store.save(&snapshot)?;
    let unchanged = previous_hash.as_deref() == Some(meta.data_hash.as_str());

    info!(
        %market,
        saved = meta.record_count,
        failed = failures.len(),
        alerts = alerts.len(),
        unchanged,
        "refresh complete"
    );

    Ok(RefreshSummary {
        market,
        total,
        saved: meta.record_count,
        failures,
        alerts,
        meta,
        unchanged,
    })
}
