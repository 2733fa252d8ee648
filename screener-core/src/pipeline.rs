//! Screener façade: load snapshots, apply a filter state, rank and summarize.

use crate::config::{ConfigError, ScreenerConfig};
use crate::data::{
    refresh_market, Freshness, MarketDataProvider, RefreshError, RefreshProgress, RefreshSummary,
    SnapshotStore, StoreError,
};
use crate::domain::{Market, MarketSnapshot, StockRecord, Universe};
use crate::screen::{self, Exclusion, FilterChange, FilterState, RankMetric, SortDirection, Summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("no data for {market} yet (run `screener refresh {market}`)")]
    NoData { market: Market },

    #[error("cached data for {market} is corrupt: {reason} (run `screener refresh {market}`)")]
    Corrupt { market: Market, reason: String },

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ScreenError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { market, .. } => Self::NoData { market },
            StoreError::Corrupt { market, reason } => Self::Corrupt { market, reason },
            other => Self::Store(other),
        }
    }
}

/// Why a screen shows what it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenStatus {
    /// At least one record passed the filters.
    Populated,
    /// Data exists but the filters excluded every record.
    AllFiltered,
    /// The loaded snapshots contain no records.
    EmptySnapshot,
}

/// A filtered, ranked view over one or more markets.
#[derive(Debug, Clone, Serialize)]
pub struct Screen {
    pub markets: Vec<Market>,
    pub status: ScreenStatus,
    pub refreshed_at: BTreeMap<Market, DateTime<Utc>>,
    pub sort: RankMetric,
    pub direction: SortDirection,
    /// Retained records in rank order.
    pub records: Vec<StockRecord>,
    pub exclusions: Vec<Exclusion>,
    pub changes: Vec<FilterChange>,
    pub summary: Summary,
}

impl Screen {
    /// Re-rank the retained records.
    pub fn sorted_by(mut self, metric: RankMetric, direction: SortDirection) -> Self {
        screen::rank(&mut self.records, metric, direction);
        self.sort = metric;
        self.direction = direction;
        self
    }

    /// Keep only the first `n` rows. The summary still describes every retained record.
    pub fn top(mut self, n: usize) -> Self {
        self.records = screen::top(self.records, n);
        self
    }
}

/// What `load_or_refresh` had to do.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The cached snapshot was fresh.
    NotNeeded,
    Refreshed(RefreshSummary),
    /// The refresh failed and the stale snapshot was used instead.
    Failed(RefreshError),
}

#[derive(Debug)]
pub struct Loaded {
    pub snapshot: MarketSnapshot,
    pub refresh: RefreshOutcome,
}

pub struct Screener {
    config: ScreenerConfig,
    store: SnapshotStore,
    universe: Universe,
}

impl Screener {
    pub fn new(config: ScreenerConfig, universe: Universe) -> Self {
        let store = SnapshotStore::new(config.layout());
        Self {
            config,
            store,
            universe,
        }
    }

    /// Build from config, loading the universe file if one is configured.
    pub fn from_config(config: ScreenerConfig) -> Result<Self, ConfigError> {
        let universe = config.universe()?;
        Ok(Self::new(config, universe))
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The filter state with every criterion at its default.
    pub fn reset_filters(&self) -> FilterState {
        FilterState::default()
    }

    pub fn freshness(&self, market: Market, now: DateTime<Utc>) -> Freshness {
        self.store.freshness(market, self.config.max_age(), now)
    }

    /// Load one market's snapshot and apply `state`.
    pub fn load_and_filter(&self, market: Market, state: &FilterState) -> Result<Screen, ScreenError> {
        self.load_and_filter_many(&[market], state)
    }

    /// Combined view over several markets. Fails on the first market that
    /// cannot be loaded.
    pub fn load_and_filter_many(
        &self,
        markets: &[Market],
        state: &FilterState,
    ) -> Result<Screen, ScreenError> {
        let snapshots = markets
            .iter()
            .map(|&m| self.store.load(m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.screen(&snapshots, state))
    }

    /// Apply `state` to already-loaded snapshots.
    pub fn screen(&self, snapshots: &[MarketSnapshot], state: &FilterState) -> Screen {
        let records: Vec<StockRecord> = snapshots
            .iter()
            .flat_map(|s| s.records().iter().cloned())
            .collect();

        let outcome = screen::apply(&records, state);
        let summary = screen::summarize(outcome.total, &outcome.retained, &self.config.display);
        let status = if outcome.total == 0 {
            ScreenStatus::EmptySnapshot
        } else if outcome.retained.is_empty() {
            ScreenStatus::AllFiltered
        } else {
            ScreenStatus::Populated
        };

        let sort = self.config.default_sort;
        let direction = sort.natural_direction();
        let mut retained = outcome.retained;
        screen::rank(&mut retained, sort, direction);

        Screen {
            markets: snapshots.iter().map(|s| s.market()).collect(),
            status,
            refreshed_at: snapshots
                .iter()
                .map(|s| (s.market(), s.refreshed_at()))
                .collect(),
            sort,
            direction,
            records: retained,
            exclusions: outcome.exclusions,
            changes: state.describe(),
            summary,
        }
    }

    /// Refresh one market from `provider`.
    pub fn refresh(
        &self,
        market: Market,
        provider: &dyn MarketDataProvider,
        now: DateTime<Utc>,
        progress: &dyn RefreshProgress,
    ) -> Result<RefreshSummary, RefreshError> {
        refresh_market(provider, &self.store, &self.universe, market, now, progress)
    }

    /// Reuse the cached snapshot while it is fresh, otherwise refresh it.
    ///
    /// A failed refresh falls back to the stale snapshot when one is readable;
    /// with nothing usable on disk the refresh error is returned.
    pub fn load_or_refresh(
        &self,
        market: Market,
        provider: &dyn MarketDataProvider,
        now: DateTime<Utc>,
        progress: &dyn RefreshProgress,
    ) -> Result<Loaded, ScreenError> {
        let freshness = self.freshness(market, now);
        if freshness.is_fresh() {
            match self.store.load(market) {
                Ok(snapshot) => {
                    return Ok(Loaded {
                        snapshot,
                        refresh: RefreshOutcome::NotNeeded,
                    })
                }
                Err(e) => warn!(%market, error = %e, "fresh snapshot unreadable, refreshing"),
            }
        }

        info!(%market, ?freshness, "snapshot needs refresh");
        match self.refresh(market, provider, now, progress) {
            Ok(summary) => Ok(Loaded {
                snapshot: self.store.load(market)?,
                refresh: RefreshOutcome::Refreshed(summary),
            }),
            Err(err) => match self.store.load(market) {
                Ok(snapshot) => {
                    warn!(%market, error = %err, "refresh failed, using stale snapshot");
                    Ok(Loaded {
                        snapshot,
                        refresh: RefreshOutcome::Failed(err),
                    })
                }
                Err(_) => Err(ScreenError::Refresh(err)),
            },
        }
    }
}
