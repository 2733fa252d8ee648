//! Filter state: the user's current bounds and sector selection.
//!
//! A `FilterState` is a value. Edits return a new state and an invalid edit
//! leaves the old one as it was, so there is never a half-applied change.

use super::filter::{Predicate, PREDICATES};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("invalid bound {value} for {predicate}: {reason}")]
    InvalidBound {
        predicate: Predicate,
        value: f64,
        reason: String,
    },
}

/// Whether any criterion differs from its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterPhase {
    Default,
    Customized,
}

/// One criterion that differs from its default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterChange {
    Bound {
        predicate: Predicate,
        default: f64,
        current: f64,
    },
    Sectors {
        selected: Vec<String>,
    },
}

impl fmt::Display for FilterChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound {
                predicate,
                default,
                current,
            } => {
                let spec = predicate.spec();
                write!(
                    f,
                    "{}: {current}{} (default {default}{})",
                    spec.label, spec.unit, spec.unit
                )
            }
            Self::Sectors { selected } => write!(f, "Sectors: {}", selected.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    bounds: [f64; PREDICATES.len()],
    sectors: BTreeSet<String>,
}

impl Default for FilterState {
    fn default() -> Self {
        let mut bounds = [0.0; PREDICATES.len()];
        for spec in &PREDICATES {
            bounds[spec.predicate.index()] = spec.default;
        }
        Self {
            bounds,
            sectors: BTreeSet::new(),
        }
    }
}

impl FilterState {
    /// Every bound at its default and no sector selection.
    pub fn reset(&self) -> FilterState {
        FilterState::default()
    }

    pub fn bound(&self, predicate: Predicate) -> f64 {
        self.bounds[predicate.index()]
    }

    /// New state with `predicate` set to `value`.
    pub fn with_bound(&self, predicate: Predicate, value: f64) -> Result<FilterState, FilterError> {
        let spec = predicate.spec();
        if !value.is_finite() {
            return Err(FilterError::InvalidBound {
                predicate,
                value,
                reason: "bound must be a finite number".into(),
            });
        }
        if value < spec.min || value > spec.max {
            return Err(FilterError::InvalidBound {
                predicate,
                value,
                reason: format!("must be within [{}, {}]", spec.min, spec.max),
            });
        }

        let mut next = self.clone();
        next.bounds[predicate.index()] = value;
        Ok(next)
    }

    /// New state selecting exactly `sectors`. Empty selects every sector.
    pub fn with_sectors<I, S>(&self, sectors: I) -> FilterState
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterState {
            bounds: self.bounds,
            sectors: sectors
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect(),
        }
    }

    pub fn sectors(&self) -> &BTreeSet<String> {
        &self.sectors
    }

    pub fn sector_selected(&self, sector: &str) -> bool {
        self.sectors.is_empty() || self.sectors.contains(sector)
    }

    /// Criteria that differ from default, in table order, sectors last.
    pub fn describe(&self) -> Vec<FilterChange> {
        let mut changes: Vec<FilterChange> = PREDICATES
            .iter()
            .filter(|spec| self.bound(spec.predicate) != spec.default)
            .map(|spec| FilterChange::Bound {
                predicate: spec.predicate,
                default: spec.default,
                current: self.bound(spec.predicate),
            })
            .collect();

        if !self.sectors.is_empty() {
            changes.push(FilterChange::Sectors {
                selected: self.sectors.iter().cloned().collect(),
            });
        }
        changes
    }

    pub fn phase(&self) -> FilterPhase {
        if self.is_default() {
            FilterPhase::Default
        } else {
            FilterPhase::Customized
        }
    }

    pub fn is_default(&self) -> bool {
        *self == FilterState::default()
    }
}
