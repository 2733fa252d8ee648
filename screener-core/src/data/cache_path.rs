//! Cache path resolution: the single place that turns a market into file paths.
//!
//! Layout: `{data_dir}/{stem}.parquet`, with the metadata sidecar at
//! `{data_dir}/{stem}.meta.json` and the in-flight write at
//! `{data_dir}/{stem}.parquet.tmp`.
//!
//! `SnapshotPath` has no public constructor, so the only way to get a snapshot
//! location is through `CacheLayout::resolve`. Reads, writes, existence and
//! size checks therefore always agree on where a market lives.

use crate::domain::{Market, UnknownMarket};
use std::path::{Path, PathBuf};

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Root of the on-disk cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    data_dir: PathBuf,
}

impl CacheLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Canonical snapshot location for a market. Pure: no filesystem access.
    pub fn resolve(&self, market: Market) -> SnapshotPath {
        SnapshotPath {
            market,
            snapshot: self
                .data_dir
                .join(format!("{}.parquet", market.file_stem())),
        }
    }

    /// Resolve from a user-supplied market key.
    pub fn resolve_key(&self, key: &str) -> Result<SnapshotPath, UnknownMarket> {
        Ok(self.resolve(key.parse()?))
    }
}

impl Default for CacheLayout {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// Resolved file locations for one market's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPath {
    market: Market,
    snapshot: PathBuf,
}

impl SnapshotPath {
    pub fn market(&self) -> Market {
        self.market
    }

    /// The parquet file holding the records.
    pub fn snapshot(&self) -> &Path {
        &self.snapshot
    }

    pub fn meta(&self) -> PathBuf {
        self.snapshot.with_extension("meta.json")
    }

    pub fn temp(&self) -> PathBuf {
        self.snapshot.with_extension("parquet.tmp")
    }

    pub fn dir(&self) -> &Path {
        self.snapshot.parent().unwrap_or_else(|| Path::new("."))
    }
}
