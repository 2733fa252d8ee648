//! Screening: filter predicates, filter state, ranking, aggregation and scoring.

pub mod filter;
pub mod rank;
pub mod score;
pub mod state;

pub use filter::{apply, passes, BoundKind, Criterion, Exclusion, FilterOutcome, Predicate, PredicateSpec, PREDICATES};
pub use rank::{
    rank, sector_summaries, summarize, top, DisplayConfig, RankMetric, SectorSummary, SortDirection,
    Summary,
};
pub use score::{score, Grade, ScoreInputs};
pub use state::{FilterChange, FilterError, FilterPhase, FilterState};
