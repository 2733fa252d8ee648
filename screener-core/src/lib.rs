//! Screener Core: market snapshots, filtering, ranking and cache freshness.
//!
//! This crate contains:
//! - Domain types (markets, stock records, snapshots, the tracked universe)
//! - Cache path resolution and the Parquet snapshot store
//! - Quote providers (Yahoo Finance, seeded synthetic) and normalization
//! - The filter predicate engine, filter state, ranking and summaries
//! - The `Screener` façade tying load → filter → rank together

pub mod config;
pub mod data;
pub mod domain;
pub mod pipeline;
pub mod screen;

pub use config::{ConfigError, ScreenerConfig};
pub use pipeline::{Loaded, RefreshOutcome, Screen, ScreenError, ScreenStatus, Screener};
