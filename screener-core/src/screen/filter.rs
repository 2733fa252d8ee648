//! Filter predicate engine.
//!
//! Every numeric criterion is a row of the `PREDICATES` table: the record field
//! it reads, whether the bound is a floor or a ceiling, its default and the
//! range of bounds that make sense. Sector membership is the one non-numeric
//! criterion and lives next to the bounds in `FilterState`.
//!
//! Rules:
//! - bounds are inclusive
//! - a record with no value for a field passes that field's predicate
//! - an empty sector selection means every sector

use super::state::FilterState;
use crate::domain::StockRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    MinUpside,
    MinTotalReturn,
    MaxPe,
    MinRoe,
    MaxVolatility,
    MinDividend,
    MinMarketCap,
    MinAnalysts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundKind {
    /// Field must be at least the bound.
    Min,
    /// Field must be at most the bound.
    Max,
}

/// One row of the declarative predicate table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredicateSpec {
    pub predicate: Predicate,
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub kind: BoundKind,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

/// Defaults are permissive: a well-behaved record passes all of them.
pub const PREDICATES: [PredicateSpec; 8] = [
    PredicateSpec {
        predicate: Predicate::MinUpside,
        key: "min_upside",
        label: "Minimum upside",
        unit: "%",
        kind: BoundKind::Min,
        default: -50.0,
        min: -100.0,
        max: 1000.0,
    },
    PredicateSpec {
        predicate: Predicate::MinTotalReturn,
        key: "min_total_return",
        label: "Minimum 1y total return",
        unit: "%",
        kind: BoundKind::Min,
        default: -50.0,
        min: -100.0,
        max: 1000.0,
    },
    PredicateSpec {
        predicate: Predicate::MaxPe,
        key: "max_pe",
        label: "Maximum P/E",
        unit: "x",
        kind: BoundKind::Max,
        default: 100.0,
        min: 0.0,
        max: 10_000.0,
    },
    PredicateSpec {
        predicate: Predicate::MinRoe,
        key: "min_roe",
        label: "Minimum ROE",
        unit: "%",
        kind: BoundKind::Min,
        default: -50.0,
        min: -1000.0,
        max: 1000.0,
    },
    PredicateSpec {
        predicate: Predicate::MaxVolatility,
        key: "max_volatility",
        label: "Maximum volatility",
        unit: "%",
        kind: BoundKind::Max,
        default: 150.0,
        min: 0.0,
        max: 1000.0,
    },
    PredicateSpec {
        predicate: Predicate::MinDividend,
        key: "min_dividend",
        label: "Minimum dividend yield",
        unit: "%",
        kind: BoundKind::Min,
        default: 0.0,
        min: 0.0,
        max: 100.0,
    },
    PredicateSpec {
        predicate: Predicate::MinMarketCap,
        key: "min_market_cap",
        label: "Minimum market cap",
        unit: "bn",
        kind: BoundKind::Min,
        default: 0.0,
        min: 0.0,
        max: 1_000_000.0,
    },
    PredicateSpec {
        predicate: Predicate::MinAnalysts,
        key: "min_analysts",
        label: "Minimum analyst count",
        unit: "",
        kind: BoundKind::Min,
        default: 0.0,
        min: 0.0,
        max: 1000.0,
    },
];

impl Predicate {
    pub const ALL: [Predicate; 8] = [
        Predicate::MinUpside,
        Predicate::MinTotalReturn,
        Predicate::MaxPe,
        Predicate::MinRoe,
        Predicate::MaxVolatility,
        Predicate::MinDividend,
        Predicate::MinMarketCap,
        Predicate::MinAnalysts,
    ];

    /// Position in `PREDICATES` and in `FilterState`'s bound array.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn spec(self) -> &'static PredicateSpec {
        &PREDICATES[self.index()]
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn default_bound(self) -> f64 {
        self.spec().default
    }

    /// The field this predicate reads, in the bound's units.
    pub fn value_of(self, record: &StockRecord) -> Option<f64> {
        match self {
            Self::MinUpside => record.upside_pct,
            Self::MinTotalReturn => record.total_return_1y,
            Self::MaxPe => record.pe_ratio,
            Self::MinRoe => record.roe,
            Self::MaxVolatility => record.effective_volatility(),
            Self::MinDividend => record.dividend_yield,
            Self::MinMarketCap => Some(record.market_cap_billions()),
            Self::MinAnalysts => record.num_analysts.map(f64::from),
        }
    }

    /// Inclusive comparison; missing values pass.
    pub fn passes(self, record: &StockRecord, bound: f64) -> bool {
        match self.value_of(record) {
            None => true,
            Some(v) if v.is_nan() => true,
            Some(v) => match self.spec().kind {
                BoundKind::Min => v >= bound,
                BoundKind::Max => v <= bound,
            },
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Predicate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| {
                let keys: Vec<_> = Self::ALL.iter().map(|p| p.key()).collect();
                format!("unknown filter '{s}' (expected one of: {})", keys.join(", "))
            })
    }
}

/// Something that can exclude a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Bound(Predicate),
    Sectors,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound(p) => write!(f, "{p}"),
            Self::Sectors => f.write_str("sectors"),
        }
    }
}

/// How many records one criterion excludes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub criterion: Criterion,
    pub excluded: usize,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub total: usize,
    /// Records passing every criterion, in input order.
    pub retained: Vec<StockRecord>,
    /// One entry per predicate, then one for the sector selection.
    pub exclusions: Vec<Exclusion>,
}

impl FilterOutcome {
    pub fn excluded(&self) -> usize {
        self.total - self.retained.len()
    }

    pub fn excluded_by(&self, criterion: Criterion) -> usize {
        self.exclusions
            .iter()
            .find(|e| e.criterion == criterion)
            .map(|e| e.excluded)
            .unwrap_or(0)
    }
}

/// True iff `record` passes every bound and the sector selection.
pub fn passes(record: &StockRecord, state: &FilterState) -> bool {
    Predicate::ALL
        .iter()
        .all(|p| p.passes(record, state.bound(*p)))
        && state.sector_selected(&record.sector)
}

/// Apply `state` to `records`.
///
/// Exclusion counts are per criterion in isolation: a record failing two
/// predicates is counted under both, so the counts may sum to more than
/// `excluded()`.
pub fn apply(records: &[StockRecord], state: &FilterState) -> FilterOutcome {
    let retained: Vec<StockRecord> = records
        .iter()
        .filter(|r| passes(r, state))
        .cloned()
        .collect();

    let mut exclusions: Vec<Exclusion> = Predicate::ALL
        .iter()
        .map(|&p| Exclusion {
            criterion: Criterion::Bound(p),
            excluded: records
                .iter()
                .filter(|r| !p.passes(r, state.bound(p)))
                .count(),
        })
        .collect();
    exclusions.push(Exclusion {
        criterion: Criterion::Sectors,
        excluded: records
            .iter()
            .filter(|r| !state.sector_selected(&r.sector))
            .count(),
    });

    FilterOutcome {
        total: records.len(),
        retained,
        exclusions,
    }
}
