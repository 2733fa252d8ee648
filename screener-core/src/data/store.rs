//! Market snapshot store: one Parquet file per market.
//!
//! Every operation takes a `Market` and resolves its location through
//! `CacheLayout`; nothing in here builds a path by hand.
//!
//! Features:
//! - Whole-file atomic replace (write `.parquet.tmp`, rename into place)
//! - Lossless round trip of every record field, nulls included
//! - Integrity validation on load (columns, types, market, unique symbols)
//! - Metadata sidecar per market (record count, content hash, refresh time)
//! - Freshness check against a maximum age

use super::cache_path::{CacheLayout, SnapshotPath};
use crate::domain::{Market, MarketSnapshot, StockRecord};
use chrono::{DateTime, Duration, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no cached snapshot for {market} at {} (run `refresh {market}` first)", path.display())]
    NotFound { market: Market, path: PathBuf },

    #[error("cached snapshot for {market} is corrupt: {reason}")]
    Corrupt { market: Market, reason: String },

    #[error("refusing to save an empty snapshot for {market}")]
    IncompleteSnapshot { market: Market },

    #[error("refusing to save non-finite {field} for {symbol} in {market}")]
    NonFinite {
        market: Market,
        symbol: String,
        field: &'static str,
    },

    #[error("cache I/O error: {0}")]
    Io(String),
}

/// Metadata sidecar written next to each snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub market: Market,
    pub record_count: usize,
    pub data_hash: String,
    pub refreshed_at: DateTime<Utc>,
    pub written_at: DateTime<Utc>,
}

/// How old a cached snapshot is relative to the configured maximum age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh { age: Duration },
    Stale { age: Duration },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }

    pub fn age(&self) -> Option<Duration> {
        match self {
            Self::Missing => None,
            Self::Fresh { age } | Self::Stale { age } => Some(*age),
        }
    }
}

/// Cache status for a single market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStatus {
    pub market: Market,
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub record_count: Option<usize>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// The snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    layout: CacheLayout,
}

impl SnapshotStore {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// True iff the market's snapshot file is a non-empty regular file.
    pub fn exists(&self, market: Market) -> bool {
        let path = self.layout.resolve(market);
        fs::metadata(path.snapshot())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    pub fn size_bytes(&self, market: Market) -> Result<u64, StoreError> {
        let path = self.layout.resolve(market);
        match fs::metadata(path.snapshot()) {
            Ok(m) if m.is_file() => Ok(m.len()),
            _ => Err(not_found(&path)),
        }
    }

    /// Load the whole snapshot for a market.
    ///
    /// A file that is present but empty is `Corrupt`, not `NotFound`.
    pub fn load(&self, market: Market) -> Result<MarketSnapshot, StoreError> {
        let path = self.layout.resolve(market);
        match fs::metadata(path.snapshot()) {
            Ok(m) if m.is_file() && m.len() == 0 => {
                return Err(StoreError::Corrupt {
                    market,
                    reason: "snapshot file is empty".into(),
                })
            }
            Ok(m) if m.is_file() => {}
            _ => return Err(not_found(&path)),
        }

        let file = fs::File::open(path.snapshot()).map_err(|e| StoreError::Io(format!("open: {e}")))?;
        let df = ParquetReader::new(file).finish().map_err(|e| StoreError::Corrupt {
            market,
            reason: format!("unreadable parquet: {e}"),
        })?;

        let snapshot = dataframe_to_snapshot(market, &df).map_err(|reason| StoreError::Corrupt {
            market,
            reason,
        })?;
        debug!(%market, records = snapshot.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Replace the market's snapshot with `snapshot`.
    ///
    /// Writes to a temp file and renames it into place, so a reader sees
    /// either the old file or the new one. The old sidecar is removed before
    /// the rename and the new one written after it. Once the rename succeeds
    /// the save has succeeded: a sidecar that cannot be written is logged and
    /// readers fall back to the snapshot itself.
    pub fn save(&self, snapshot: &MarketSnapshot) -> Result<SnapshotMeta, StoreError> {
        let market = snapshot.market();
        if snapshot.is_empty() {
            return Err(StoreError::IncompleteSnapshot { market });
        }

        let path = self.layout.resolve(market);
        fs::create_dir_all(path.dir())
            .map_err(|e| StoreError::Io(format!("failed to create dir: {e}")))?;

        check_finite(snapshot)?;
        let mut df = snapshot_to_dataframe(snapshot)?;
        let tmp_path = path.temp();
        write_parquet(&mut df, &tmp_path)?;

        let meta = SnapshotMeta {
            market,
            record_count: snapshot.len(),
            data_hash: snapshot.content_hash(),
            refreshed_at: snapshot.refreshed_at(),
            written_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(format!("meta serialization: {e}"))
        })?;

        // A stale sidecar must never describe the new snapshot.
        match fs::remove_file(path.meta()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(%market, error = %e, "could not remove old sidecar"),
        }

        fs::rename(&tmp_path, path.snapshot()).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::Io(format!("atomic rename failed: {e}"))
        })?;

        if let Err(e) = fs::write(path.meta(), meta_json) {
            warn!(%market, error = %e, "snapshot saved without sidecar");
        }

        info!(
            %market,
            records = meta.record_count,
            path = %path.snapshot().display(),
            "saved snapshot"
        );
        Ok(meta)
    }

    /// Sidecar metadata, if present and readable.
    pub fn meta(&self, market: Market) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.layout.resolve(market).meta()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Age of the cached snapshot compared to `max_age`.
    ///
    /// Uses the sidecar when available and falls back to reading the snapshot.
    /// An unreadable snapshot counts as stale so the caller refreshes it.
    pub fn freshness(&self, market: Market, max_age: Duration, now: DateTime<Utc>) -> Freshness {
        if !self.exists(market) {
            return Freshness::Missing;
        }

        let refreshed_at = match self.meta(market) {
            Some(meta) => Some(meta.refreshed_at),
            None => self.load(market).ok().map(|s| s.refreshed_at()),
        };

        let Some(refreshed_at) = refreshed_at else {
            return Freshness::Stale {
                age: Duration::MAX,
            };
        };

        let age = (now - refreshed_at).max(Duration::zero());
        if age < max_age {
            Freshness::Fresh { age }
        } else {
            Freshness::Stale { age }
        }
    }

    pub fn status(&self, markets: &[Market]) -> Vec<SnapshotStatus> {
        markets
            .iter()
            .map(|&market| {
                let meta = self.meta(market);
                SnapshotStatus {
                    market,
                    path: self.layout.resolve(market).snapshot().to_path_buf(),
                    exists: self.exists(market),
                    size_bytes: self.size_bytes(market).ok(),
                    record_count: meta.as_ref().map(|m| m.record_count),
                    refreshed_at: meta.as_ref().map(|m| m.refreshed_at),
                }
            })
            .collect()
    }

    /// Delete a market's snapshot, sidecar and any leftover temp file.
    /// Returns the number of files removed.
    pub fn remove(&self, market: Market) -> Result<usize, StoreError> {
        let path = self.layout.resolve(market);
        let mut removed = 0;
        for file in [path.snapshot().to_path_buf(), path.meta(), path.temp()] {
            match fs::remove_file(&file) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(format!("remove {}: {e}", file.display()))),
            }
        }
        if removed > 0 {
            info!(%market, removed, "cleared cached snapshot");
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for market in Market::ALL {
            removed += self.remove(market)?;
        }
        Ok(removed)
    }
}

fn not_found(path: &SnapshotPath) -> StoreError {
    StoreError::NotFound {
        market: path.market(),
        path: path.snapshot().to_path_buf(),
    }
}

/// Human-readable file size (B, KB, MB).
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

const OPTIONAL_F64_COLUMNS: [&str; 11] = [
    "pe_ratio",
    "roe",
    "roa",
    "profit_margin",
    "debt_to_equity",
    "dividend_yield",
    "payout_ratio",
    "beta",
    "total_return_1y",
    "upside_pct",
    "volatility_pct",
];

/// Missing values are stored as nulls; NaN and infinities have no place on disk.
fn check_finite(snapshot: &MarketSnapshot) -> Result<(), StoreError> {
    for r in snapshot.records() {
        let fields = [
            ("price", Some(r.price)),
            ("market_cap", Some(r.market_cap)),
            ("pe_ratio", r.pe_ratio),
            ("roe", r.roe),
            ("roa", r.roa),
            ("profit_margin", r.profit_margin),
            ("debt_to_equity", r.debt_to_equity),
            ("dividend_yield", r.dividend_yield),
            ("payout_ratio", r.payout_ratio),
            ("beta", r.beta),
            ("total_return_1y", r.total_return_1y),
            ("upside_pct", r.upside_pct),
            ("volatility_pct", r.volatility_pct),
        ];
        if let Some((field, _)) = fields
            .iter()
            .find(|(_, v)| v.is_some_and(|v| !v.is_finite()))
        {
            return Err(StoreError::NonFinite {
                market: snapshot.market(),
                symbol: r.symbol.clone(),
                field: *field,
            });
        }
    }
    Ok(())
}

fn snapshot_to_dataframe(snapshot: &MarketSnapshot) -> Result<DataFrame, StoreError> {
    let records = snapshot.records();
    let refreshed_ms = snapshot.refreshed_at().timestamp_millis();

    let text = |f: fn(&StockRecord) -> &str| -> Vec<String> {
        records.iter().map(|r| f(r).to_string()).collect()
    };
    let required = |f: fn(&StockRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
    let optional =
        |f: fn(&StockRecord) -> Option<f64>| -> Vec<Option<f64>> { records.iter().map(f).collect() };

    DataFrame::new(vec![
        Column::new("symbol".into(), text(|r| &r.symbol)),
        Column::new("name".into(), text(|r| &r.name)),
        Column::new("market".into(), text(|r| r.market.key())),
        Column::new("sector".into(), text(|r| &r.sector)),
        Column::new("price".into(), required(|r| r.price)),
        Column::new("market_cap".into(), required(|r| r.market_cap)),
        Column::new("pe_ratio".into(), optional(|r| r.pe_ratio)),
        Column::new("roe".into(), optional(|r| r.roe)),
        Column::new("roa".into(), optional(|r| r.roa)),
        Column::new("profit_margin".into(), optional(|r| r.profit_margin)),
        Column::new("debt_to_equity".into(), optional(|r| r.debt_to_equity)),
        Column::new("dividend_yield".into(), optional(|r| r.dividend_yield)),
        Column::new("payout_ratio".into(), optional(|r| r.payout_ratio)),
        Column::new("beta".into(), optional(|r| r.beta)),
        Column::new("total_return_1y".into(), optional(|r| r.total_return_1y)),
        Column::new("upside_pct".into(), optional(|r| r.upside_pct)),
        Column::new("volatility_pct".into(), optional(|r| r.volatility_pct)),
        Column::new(
            "num_analysts".into(),
            records.iter().map(|r| r.num_analysts).collect::<Vec<Option<u32>>>(),
        ),
        Column::new(
            "score".into(),
            records
                .iter()
                .map(|r| r.score.map(u32::from))
                .collect::<Vec<Option<u32>>>(),
        ),
        Column::new("refreshed_at_ms".into(), vec![refreshed_ms; records.len()]),
    ])
    .map_err(|e| StoreError::Io(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), StoreError> {
    let file = fs::File::create(path).map_err(|e| StoreError::Io(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| StoreError::Io(format!("write parquet: {e}")))?;
    Ok(())
}

fn dataframe_to_snapshot(market: Market, df: &DataFrame) -> Result<MarketSnapshot, String> {
    if df.height() == 0 {
        return Err("snapshot has no rows".into());
    }

    let str_col = |name: &str| -> Result<&StringChunked, String> {
        df.column(name)
            .map_err(|_| format!("missing column '{name}'"))?
            .str()
            .map_err(|e| format!("{name} column type: {e}"))
    };
    let f64_col = |name: &str| -> Result<&Float64Chunked, String> {
        df.column(name)
            .map_err(|_| format!("missing column '{name}'"))?
            .f64()
            .map_err(|e| format!("{name} column type: {e}"))
    };
    let u32_col = |name: &str| -> Result<&UInt32Chunked, String> {
        df.column(name)
            .map_err(|_| format!("missing column '{name}'"))?
            .u32()
            .map_err(|e| format!("{name} column type: {e}"))
    };

    let symbols = str_col("symbol")?;
    let names = str_col("name")?;
    let markets = str_col("market")?;
    let sectors = str_col("sector")?;
    let prices = f64_col("price")?;
    let caps = f64_col("market_cap")?;
    let optional: Vec<&Float64Chunked> = OPTIONAL_F64_COLUMNS
        .iter()
        .map(|name| f64_col(name))
        .collect::<Result<_, _>>()?;
    let analysts = u32_col("num_analysts")?;
    let scores = u32_col("score")?;
    let refreshed = df
        .column("refreshed_at_ms")
        .map_err(|_| "missing column 'refreshed_at_ms'".to_string())?
        .i64()
        .map_err(|e| format!("refreshed_at_ms column type: {e}"))?;

    let refreshed_ms = refreshed
        .get(0)
        .ok_or_else(|| "null refreshed_at_ms".to_string())?;
    let refreshed_at = DateTime::<Utc>::from_timestamp_millis(refreshed_ms)
        .ok_or_else(|| format!("invalid refreshed_at_ms {refreshed_ms}"))?;

    let opt = |col: usize, row: usize| -> Result<Option<f64>, String> {
        match optional[col].get(row) {
            Some(v) if !v.is_finite() => Err(format!(
                "non-finite {} at row {row}",
                OPTIONAL_F64_COLUMNS[col]
            )),
            v => Ok(v),
        }
    };
    let finite = |name: &str, row: usize, v: Option<f64>| -> Result<f64, String> {
        match v {
            None => Err(format!("null {name} at row {row}")),
            Some(v) if !v.is_finite() => Err(format!("non-finite {name} at row {row}")),
            Some(v) => Ok(v),
        }
    };

    let mut records = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let symbol = symbols
            .get(i)
            .ok_or_else(|| format!("null symbol at row {i}"))?;
        let row_market: Market = markets
            .get(i)
            .ok_or_else(|| format!("null market at row {i}"))?
            .parse()
            .map_err(|e| format!("row {i}: {e}"))?;
        let score = match scores.get(i) {
            Some(s) => Some(u8::try_from(s).map_err(|_| format!("score {s} out of range at row {i}"))?),
            None => None,
        };

        records.push(StockRecord {
            symbol: symbol.to_string(),
            name: names
                .get(i)
                .ok_or_else(|| format!("null name at row {i}"))?
                .to_string(),
            market: row_market,
            sector: sectors
                .get(i)
                .ok_or_else(|| format!("null sector at row {i}"))?
                .to_string(),
            price: finite("price", i, prices.get(i))?,
            market_cap: finite("market_cap", i, caps.get(i))?,
            pe_ratio: opt(0, i)?,
            roe: opt(1, i)?,
            roa: opt(2, i)?,
            profit_margin: opt(3, i)?,
            debt_to_equity: opt(4, i)?,
            dividend_yield: opt(5, i)?,
            payout_ratio: opt(6, i)?,
            beta: opt(7, i)?,
            total_return_1y: opt(8, i)?,
            upside_pct: opt(9, i)?,
            volatility_pct: opt(10, i)?,
            num_analysts: analysts.get(i),
            score,
        });
    }

    MarketSnapshot::new(market, refreshed_at, records).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_snapshot(market: Market) -> MarketSnapshot {
        let mut full = StockRecord::new("SAN.MC", "Banco Santander", market, "Banking", 4.2, 65e9);
        full.pe_ratio = Some(6.1);
        full.roe = Some(12.5);
        full.roa = Some(0.7);
        full.profit_margin = Some(28.0);
        full.debt_to_equity = Some(3.1);
        full.dividend_yield = Some(0.0);
        full.payout_ratio = Some(25.0);
        full.beta = Some(1.2);
        full.total_return_1y = Some(-3.5);
        full.upside_pct = Some(18.0);
        full.volatility_pct = Some(27.0);
        full.num_analysts = Some(22);
        full.score = Some(71);

        let sparse = StockRecord::new("PHM.MC", "PharmaMar", market, "Pharma", 35.0, 0.6e9);

        MarketSnapshot::new(
            market,
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
            vec![full, sparse],
        )
        .unwrap()
    }

    #[test]
    fn save_and_load_roundtrip_preserves_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        let snapshot = sample_snapshot(Market::Ibex35);

        store.save(&snapshot).unwrap();
        let loaded = store.load(Market::Ibex35).unwrap();

        assert_eq!(loaded, snapshot);
        let sparse = loaded.get("PHM.MC").unwrap();
        assert_eq!(sparse.pe_ratio, None);
        assert_eq!(sparse.score, None);
        assert_eq!(loaded.get("SAN.MC").unwrap().dividend_yield, Some(0.0));
    }

    #[test]
    fn load_missing_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));

        match store.load(Market::Nasdaq) {
            Err(StoreError::NotFound { market, .. }) => assert_eq!(market, Market::Nasdaq),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(store.size_bytes(Market::Nasdaq).is_err());
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());
        fs::write(layout.resolve(Market::Sp500).snapshot(), b"not parquet").unwrap();

        assert!(store.exists(Market::Sp500));
        assert!(matches!(
            store.load(Market::Sp500),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn empty_snapshot_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        let empty = MarketSnapshot::new(Market::Sp500, Utc::now(), vec![]).unwrap();

        assert!(matches!(
            store.save(&empty),
            Err(StoreError::IncompleteSnapshot { .. })
        ));
        assert!(!store.exists(Market::Sp500));
    }

    #[test]
    fn save_leaves_no_temp_file_and_writes_meta() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());
        let snapshot = sample_snapshot(Market::Ibex35);

        let meta = store.save(&snapshot).unwrap();

        assert!(!layout.resolve(Market::Ibex35).temp().exists());
        assert_eq!(meta.record_count, 2);
        assert_eq!(store.meta(Market::Ibex35).unwrap(), meta);
        assert_eq!(meta.data_hash, snapshot.content_hash());
    }

    #[test]
    fn freshness_follows_refresh_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        let snapshot = sample_snapshot(Market::Ibex35);
        let max_age = Duration::hours(24);

        assert_eq!(
            store.freshness(Market::Ibex35, max_age, Utc::now()),
            Freshness::Missing
        );

        store.save(&snapshot).unwrap();
        let soon = snapshot.refreshed_at() + Duration::hours(2);
        let later = snapshot.refreshed_at() + Duration::hours(30);

        assert_eq!(
            store.freshness(Market::Ibex35, max_age, soon),
            Freshness::Fresh {
                age: Duration::hours(2)
            }
        );
        assert_eq!(
            store.freshness(Market::Ibex35, max_age, later),
            Freshness::Stale {
                age: Duration::hours(30)
            }
        );
    }

    #[test]
    fn remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        store.save(&sample_snapshot(Market::Ibex35)).unwrap();
        store.save(&sample_snapshot(Market::Sp500)).unwrap();

        assert_eq!(store.remove(Market::Ibex35).unwrap(), 2);
        assert!(!store.exists(Market::Ibex35));
        assert!(store.exists(Market::Sp500));

        assert_eq!(store.clear().unwrap(), 2);
        assert!(!store.exists(Market::Sp500));
    }

    #[test]
    fn status_reports_each_market() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        store.save(&sample_snapshot(Market::Ibex35)).unwrap();

        let statuses = store.status(&[Market::Ibex35, Market::Nasdaq]);
        assert!(statuses[0].exists);
        assert_eq!(statuses[0].record_count, Some(2));
        assert!(statuses[0].size_bytes.unwrap() > 0);
        assert!(!statuses[1].exists);
        assert_eq!(statuses[1].size_bytes, None);
    }

    #[test]
    fn zero_byte_snapshot_is_corrupt_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());
        fs::write(layout.resolve(Market::Ibex35).snapshot(), b"").unwrap();

        assert!(!store.exists(Market::Ibex35));
        match store.load(Market::Ibex35) {
            Err(StoreError::Corrupt { market, reason }) => {
                assert_eq!(market, Market::Ibex35);
                assert!(reason.contains("empty"));
            }
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn unwritable_sidecar_does_not_fail_the_save() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());
        // A directory where the sidecar should go cannot be removed or overwritten.
        fs::create_dir_all(layout.resolve(Market::Ibex35).meta()).unwrap();
        let snapshot = sample_snapshot(Market::Ibex35);

        let meta = store.save(&snapshot).unwrap();

        assert_eq!(meta.record_count, 2);
        assert!(store.exists(Market::Ibex35));
        assert_eq!(store.load(Market::Ibex35).unwrap(), snapshot);
        assert_eq!(store.meta(Market::Ibex35), None);
        let soon = snapshot.refreshed_at() + Duration::hours(1);
        assert_eq!(
            store.freshness(Market::Ibex35, Duration::hours(24), soon),
            Freshness::Fresh {
                age: Duration::hours(1)
            }
        );
    }

    #[test]
    fn resave_replaces_the_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        let first = sample_snapshot(Market::Ibex35);
        store.save(&first).unwrap();

        let later = first.refreshed_at() + Duration::days(3);
        let second =
            MarketSnapshot::new(Market::Ibex35, later, first.records().to_vec()).unwrap();
        store.save(&second).unwrap();

        let meta = store.meta(Market::Ibex35).unwrap();
        assert_eq!(meta.refreshed_at, later);
        assert_eq!(meta.data_hash, second.content_hash());
    }

    #[test]
    fn non_finite_values_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(CacheLayout::new(dir.path()));
        let mut rec = StockRecord::new("SAN.MC", "Banco Santander", Market::Ibex35, "Banking", 4.2, 65e9);
        rec.pe_ratio = Some(f64::NAN);
        let snapshot = MarketSnapshot::new(Market::Ibex35, Utc::now(), vec![rec]).unwrap();

        match store.save(&snapshot) {
            Err(StoreError::NonFinite { symbol, field, .. }) => {
                assert_eq!(symbol, "SAN.MC");
                assert_eq!(field, "pe_ratio");
            }
            other => panic!("expected NonFinite, got {other:?}"),
        }
        assert!(!store.exists(Market::Ibex35));

        let mut rec = StockRecord::new("AAPL", "Apple", Market::Sp500, "Technology", f64::INFINITY, 3e12);
        rec.roe = Some(30.0);
        let snapshot = MarketSnapshot::new(Market::Sp500, Utc::now(), vec![rec]).unwrap();
        assert!(matches!(
            store.save(&snapshot),
            Err(StoreError::NonFinite { field: "price", .. })
        ));
    }

    #[test]
    fn nan_on_disk_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());
        let mut df = snapshot_to_dataframe(&sample_snapshot(Market::Ibex35)).unwrap();
        df.with_column(Column::new("pe_ratio".into(), vec![Some(f64::NAN), None]))
            .unwrap();
        write_parquet(&mut df, layout.resolve(Market::Ibex35).snapshot()).unwrap();

        match store.load(Market::Ibex35) {
            Err(StoreError::Corrupt { reason, .. }) => assert!(reason.contains("pe_ratio")),
            other => panic!("expected Corrupt, got {other:?}"),
        }
    }

    #[test]
    fn null_name_or_sector_on_disk_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = SnapshotStore::new(layout.clone());

        for column in ["name", "sector"] {
            let mut df = snapshot_to_dataframe(&sample_snapshot(Market::Ibex35)).unwrap();
            df.with_column(Column::new(column.into(), vec![Some("x"), None::<&str>]))
                .unwrap();
            write_parquet(&mut df, layout.resolve(Market::Ibex35).snapshot()).unwrap();

            match store.load(Market::Ibex35) {
                Err(StoreError::Corrupt { reason, .. }) => {
                    assert!(reason.contains(&format!("null {column}")), "{reason}")
                }
                other => panic!("expected Corrupt for null {column}, got {other:?}"),
            }
        }
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
