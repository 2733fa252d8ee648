//! Property tests for screening invariants.
//!
//! Uses proptest to verify:
//! 1. Reset is idempotent and restores every default
//! 2. Display size is monotonic and bounded
//! 3. Scores stay within 0..=100
//! 4. Filtering retains a subset, each member passing every criterion
//! 5. Missing values never exclude a record
//! 6. Ranking is a permutation with nulls last

use proptest::prelude::*;
use screener_core::domain::{Market, StockRecord};
use screener_core::screen::{
    apply, passes, rank, score, DisplayConfig, FilterState, Predicate, RankMetric, ScoreInputs,
    SortDirection,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_predicate() -> impl Strategy<Value = Predicate> {
    (0..Predicate::ALL.len()).prop_map(|i| Predicate::ALL[i])
}

/// A predicate with a bound inside its valid domain.
fn arb_bound() -> impl Strategy<Value = (Predicate, f64)> {
    arb_predicate().prop_flat_map(|p| {
        let spec = p.spec();
        (Just(p), spec.min..=spec.max)
    })
}

fn arb_state() -> impl Strategy<Value = FilterState> {
    (
        prop::collection::vec(arb_bound(), 0..6),
        prop::collection::vec(
            prop::sample::select(vec!["Banking", "Energy", "Technology"]),
            0..3,
        ),
    )
        .prop_map(|(bounds, sectors)| {
            let mut state = FilterState::default();
            for (p, v) in bounds {
                state = state.with_bound(p, v).unwrap_or(state);
            }
            state.with_sectors(sectors)
        })
}

fn opt(range: std::ops::Range<f64>) -> impl Strategy<Value = Option<f64>> {
    prop::option::of(range)
}

fn arb_record() -> impl Strategy<Value = StockRecord> {
    (
        (
            "[A-Z]{2,5}",
            prop::sample::select(vec!["Banking", "Energy", "Technology", "Utilities"]),
            1.0..500.0_f64,
            0.0..3e12_f64,
        ),
        (
            opt(-60.0..200.0),
            opt(-80.0..150.0),
            opt(1.0..300.0),
            opt(-40.0..60.0),
            opt(5.0..120.0),
            opt(0.0..12.0),
            opt(0.2..2.5),
            prop::option::of(0u32..40),
        ),
    )
        .prop_map(
            |((symbol, sector, price, cap), (upside, ret, pe, roe, vol, div, beta, analysts))| {
                let mut r =
                    StockRecord::new(symbol.clone(), symbol, Market::Sp500, sector, price, cap);
                r.upside_pct = upside;
                r.total_return_1y = ret;
                r.pe_ratio = pe;
                r.roe = roe;
                r.volatility_pct = vol;
                r.dividend_yield = div;
                r.beta = beta;
                r.num_analysts = analysts;
                r
            },
        )
}

// ── 1. Reset ─────────────────────────────────────────────────────────

proptest! {
    /// Resetting any state yields the defaults; resetting again changes nothing.
    #[test]
    fn reset_is_idempotent(state in arb_state()) {
        let once = state.reset();
        prop_assert_eq!(&once, &FilterState::default());
        prop_assert_eq!(once.reset(), once.clone());
        prop_assert!(once.is_default());
        prop_assert!(once.describe().is_empty());
    }

    /// Out-of-domain bounds are rejected, so every bound a state holds is valid.
    #[test]
    fn rejected_bound_is_a_no_op(state in arb_state(), p in arb_predicate(), over in 1.0..1e6_f64) {
        let too_high = p.spec().max + over;
        prop_assert!(state.with_bound(p, too_high).is_err());
        prop_assert!(state.with_bound(p, f64::NAN).is_err());
        let spec = p.spec();
        prop_assert!(state.bound(p) >= spec.min && state.bound(p) <= spec.max);
    }
}

// ── 2. Display Size ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn display_size_monotonic_and_bounded(
        min in 0u32..2000,
        extra in 0u32..4000,
        per_row in 0u32..100,
        a in 0usize..10_000,
        b in 0usize..10_000,
    ) {
        let display = DisplayConfig { min_height: min, per_row, max_height: min + extra };
        let (lo, hi) = (a.min(b), a.max(b));

        prop_assert!(display.display_size(lo) <= display.display_size(hi));
        for rows in [lo, hi] {
            let size = display.display_size(rows);
            prop_assert!(size >= display.min_height);
            prop_assert!(size <= display.max_height);
        }
    }
}

// ── 3. Score Range ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn score_is_within_range(
        upside in opt(-1e4..1e4),
        dividend in opt(-100.0..100.0),
        pe in opt(-1e4..1e4),
        pb in opt(-100.0..100.0),
        roe in opt(-1e3..1e3),
        roa in opt(-1e3..1e3),
        growth in opt(-500.0..500.0),
        analysts in prop::option::of(0u32..200),
        vol in opt(0.0..500.0),
        beta in opt(-5.0..5.0),
        cap in opt(0.0..5000.0),
        sector in prop::sample::select(vec!["Technology", "Banking", "Utilities", "Real Estate", ""]),
    ) {
        let inputs = ScoreInputs {
            upside_pct: upside,
            dividend_yield: dividend,
            pe_ratio: pe,
            price_to_book: pb,
            roe,
            roa,
            revenue_growth: growth,
            num_analysts: analysts,
            recommendation: None,
            volatility_pct: vol,
            beta,
            market_cap_billions: cap,
            sector: sector.to_string(),
        };
        prop_assert!(score(&inputs) <= 100);
    }
}

// ── 4. Filter Subset ─────────────────────────────────────────────────

proptest! {
    /// Every retained record came from the input and passes every criterion;
    /// every dropped record fails at least one.
    #[test]
    fn filter_retains_a_passing_subset(
        records in prop::collection::vec(arb_record(), 0..40),
        state in arb_state(),
    ) {
        let outcome = apply(&records, &state);

        prop_assert_eq!(outcome.total, records.len());
        prop_assert!(outcome.retained.len() <= records.len());
        for r in &outcome.retained {
            prop_assert!(records.contains(r));
            prop_assert!(passes(r, &state));
        }
        let kept = records.iter().filter(|r| passes(r, &state)).count();
        prop_assert_eq!(kept, outcome.retained.len());
        for e in &outcome.exclusions {
            prop_assert!(e.excluded <= outcome.total);
        }
    }
}

// ── 5. Missing Values ────────────────────────────────────────────────

proptest! {
    /// A record with no data for a predicate's field passes any valid bound.
    #[test]
    fn null_field_passes_any_bound((p, bound) in arb_bound()) {
        prop_assume!(p != Predicate::MinMarketCap);
        let record = StockRecord::new("NULL", "No data", Market::Nasdaq, "Technology", 10.0, 0.0);
        prop_assert!(p.passes(&record, bound));
    }
}

// ── 6. Ranking ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rank_is_a_permutation_with_nulls_last(
        records in prop::collection::vec(arb_record(), 0..40),
        descending in any::<bool>(),
    ) {
        let direction = if descending { SortDirection::Descending } else { SortDirection::Ascending };
        let mut ranked = records.clone();
        rank(&mut ranked, RankMetric::Pe, direction);

        prop_assert_eq!(ranked.len(), records.len());
        for r in &records {
            prop_assert!(ranked.contains(r));
        }

        let first_null = ranked.iter().position(|r| r.pe_ratio.is_none()).unwrap_or(ranked.len());
        prop_assert!(ranked[first_null..].iter().all(|r| r.pe_ratio.is_none()));

        let values: Vec<f64> = ranked[..first_null].iter().filter_map(|r| r.pe_ratio).collect();
        for pair in values.windows(2) {
            match direction {
                SortDirection::Ascending => prop_assert!(pair[0] <= pair[1]),
                SortDirection::Descending => prop_assert!(pair[0] >= pair[1]),
            }
        }
    }
}
