//! The cache path resolver and snapshot store agree on where every market
//! lives, and the screener reports missing and corrupt data distinctly.

mod common;

use chrono::Duration;
use common::{fixed_now, screener, snapshot, well_behaved_records};
use screener_core::data::{CacheLayout, Freshness, SnapshotStore, StoreError};
use screener_core::domain::Market;
use screener_core::ScreenError;

// ── Path consistency ─────────────────────────────────────────────────

#[test]
fn save_then_exists_size_and_load_agree() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());
    let store = SnapshotStore::new(layout.clone());

    for market in Market::ALL {
        assert!(!store.exists(market));
        store
            .save(&snapshot(market, well_behaved_records(market, 12)))
            .unwrap();

        let on_disk = std::fs::metadata(layout.resolve(market).snapshot()).unwrap();
        assert!(store.exists(market), "{market}");
        assert_eq!(store.size_bytes(market).unwrap(), on_disk.len());
        assert_eq!(store.load(market).unwrap().len(), 12);
    }
}

#[test]
fn size_check_sees_the_file_that_was_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(CacheLayout::new(dir.path()));

    store
        .save(&snapshot(Market::Ibex35, well_behaved_records(Market::Ibex35, 3)))
        .unwrap();
    let small = store.size_bytes(Market::Ibex35).unwrap();

    store
        .save(&snapshot(Market::Ibex35, well_behaved_records(Market::Ibex35, 35)))
        .unwrap();
    let large = store.size_bytes(Market::Ibex35).unwrap();

    assert!(large > small);
    assert_eq!(store.load(Market::Ibex35).unwrap().len(), 35);
}

#[test]
fn markets_do_not_overwrite_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(CacheLayout::new(dir.path()));

    store
        .save(&snapshot(Market::Sp500, well_behaved_records(Market::Sp500, 25)))
        .unwrap();
    store
        .save(&snapshot(Market::Nasdaq, well_behaved_records(Market::Nasdaq, 10)))
        .unwrap();

    assert_eq!(store.load(Market::Sp500).unwrap().len(), 25);
    assert_eq!(store.load(Market::Nasdaq).unwrap().len(), 10);
}

// ── Round trip ───────────────────────────────────────────────────────

#[test]
fn every_field_survives_including_nulls() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(CacheLayout::new(dir.path()));

    let mut records = well_behaved_records(Market::MediumCapSpain, 4);
    records[1].pe_ratio = None;
    records[1].dividend_yield = None;
    records[2].num_analysts = None;
    records[2].score = None;
    records[3].upside_pct = None;
    records[3].volatility_pct = None;
    records[3].beta = None;
    let original = snapshot(Market::MediumCapSpain, records);

    store.save(&original).unwrap();
    let loaded = store.load(Market::MediumCapSpain).unwrap();

    assert_eq!(loaded, original);
    assert_eq!(loaded.refreshed_at(), fixed_now());
}

// ── Missing and corrupt data ─────────────────────────────────────────

#[test]
fn missing_snapshot_is_no_data_not_an_empty_screen() {
    let dir = tempfile::tempdir().unwrap();
    let s = screener(dir.path());

    let err = s
        .load_and_filter(Market::MediumCapSpain, &s.reset_filters())
        .unwrap_err();
    assert!(matches!(
        err,
        ScreenError::NoData {
            market: Market::MediumCapSpain
        }
    ));
}

#[test]
fn truncated_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let s = screener(dir.path());
    s.store()
        .save(&snapshot(Market::Ibex35, well_behaved_records(Market::Ibex35, 35)))
        .unwrap();

    let path = s.store().layout().resolve(Market::Ibex35);
    let bytes = std::fs::read(path.snapshot()).unwrap();
    std::fs::write(path.snapshot(), &bytes[..bytes.len() / 3]).unwrap();

    let err = s
        .load_and_filter(Market::Ibex35, &s.reset_filters())
        .unwrap_err();
    assert!(matches!(err, ScreenError::Corrupt { market: Market::Ibex35, .. }));
}

#[test]
fn snapshot_stored_under_another_market_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let layout = CacheLayout::new(dir.path());
    let store = SnapshotStore::new(layout.clone());

    store
        .save(&snapshot(Market::Sp500, well_behaved_records(Market::Sp500, 5)))
        .unwrap();
    std::fs::copy(
        layout.resolve(Market::Sp500).snapshot(),
        layout.resolve(Market::Nasdaq).snapshot(),
    )
    .unwrap();

    assert!(matches!(
        store.load(Market::Nasdaq),
        Err(StoreError::Corrupt { .. })
    ));
}

// ── Freshness ────────────────────────────────────────────────────────

#[test]
fn freshness_window() {
    let dir = tempfile::tempdir().unwrap();
    let s = screener(dir.path());
    let refreshed = fixed_now();

    assert_eq!(s.freshness(Market::Sp500, refreshed), Freshness::Missing);

    s.store()
        .save(&snapshot(Market::Sp500, well_behaved_records(Market::Sp500, 5)))
        .unwrap();

    assert!(s
        .freshness(Market::Sp500, refreshed + Duration::hours(23))
        .is_fresh());
    assert_eq!(
        s.freshness(Market::Sp500, refreshed + Duration::hours(24)),
        Freshness::Stale {
            age: Duration::hours(24)
        }
    );
}

#[test]
fn freshness_falls_back_to_snapshot_without_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let s = screener(dir.path());
    s.store()
        .save(&snapshot(Market::Ibex35, well_behaved_records(Market::Ibex35, 5)))
        .unwrap();
    std::fs::remove_file(s.store().layout().resolve(Market::Ibex35).meta()).unwrap();

    assert_eq!(
        s.freshness(Market::Ibex35, fixed_now() + Duration::hours(1))
            .age(),
        Some(Duration::hours(1))
    );
}
