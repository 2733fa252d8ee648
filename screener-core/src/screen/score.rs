//! Attractiveness score (0-100) and its grade bands.
//!
//! The score adds points for expected return, valuation, fundamental quality
//! and market confidence, subtracts risk penalties, then applies excellence
//! bonuses and per-sector tolerances. Missing inputs fall back to neutral
//! values so a data gap neither rewards nor punishes a stock much.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized inputs to the score. Percentages are already in percent units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub upside_pct: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub price_to_book: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub num_analysts: Option<u32>,
    pub recommendation: Option<String>,
    pub volatility_pct: Option<f64>,
    pub beta: Option<f64>,
    pub market_cap_billions: Option<f64>,
    pub sector: String,
}

/// Points from the first threshold the value reaches, else zero.
fn tier(value: f64, tiers: &[(f64, i32)]) -> i32 {
    tiers
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(_, points)| *points)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default)]
struct SectorAdjustment {
    pe_tolerance: i32,
    div_bonus: i32,
    vol_tolerance: i32,
}

fn sector_adjustment(sector: &str) -> SectorAdjustment {
    let none = SectorAdjustment::default();
    match sector {
        "Technology" => SectorAdjustment {
            pe_tolerance: 5,
            ..none
        },
        "Healthcare" | "Media" => SectorAdjustment {
            pe_tolerance: 3,
            ..none
        },
        "Utilities" | "Banking" | "Financial" | "Insurance" => SectorAdjustment {
            div_bonus: 2,
            ..none
        },
        "Energy" => SectorAdjustment {
            vol_tolerance: 3,
            ..none
        },
        "Industrial" | "Construction" | "Automotive" => SectorAdjustment {
            vol_tolerance: 2,
            ..none
        },
        _ => none,
    }
}

/// Compute the 0-100 score.
pub fn score(inputs: &ScoreInputs) -> u8 {
    let upside = inputs.upside_pct.unwrap_or(0.0);
    let div_yield = inputs.dividend_yield.unwrap_or(0.0);
    let pe = inputs.pe_ratio.unwrap_or(15.0);
    let pb = inputs.price_to_book.unwrap_or(2.0);
    let roe = inputs.roe.unwrap_or(10.0);
    let roa = inputs.roa.unwrap_or(5.0);
    let growth = inputs.revenue_growth.unwrap_or(0.0);
    let analysts = f64::from(inputs.num_analysts.unwrap_or(0));
    let volatility = inputs.volatility_pct.unwrap_or(20.0);
    let beta = inputs.beta.unwrap_or(1.0);
    let market_cap = inputs.market_cap_billions.unwrap_or(5.0);

    let mut total = 0;

    // Expected return
    total += tier(
        upside,
        &[(25.0, 20), (20.0, 18), (15.0, 15), (10.0, 12), (5.0, 8), (0.0, 4), (-5.0, 2)],
    );
    total += tier(
        div_yield,
        &[(7.0, 15), (5.0, 13), (4.0, 11), (3.0, 8), (2.0, 5), (1.0, 3)],
    );

    // Valuation
    total += if pe <= 0.0 {
        0
    } else if pe < 10.0 {
        15
    } else if pe < 12.0 {
        13
    } else if pe < 15.0 {
        11
    } else if pe < 18.0 {
        8
    } else if pe < 22.0 {
        5
    } else if pe < 30.0 {
        2
    } else {
        0
    };
    total += if pb <= 0.0 {
        0
    } else if pb < 1.0 {
        5
    } else if pb < 2.0 {
        4
    } else if pb < 3.0 {
        3
    } else if pb < 5.0 {
        2
    } else {
        0
    };

    // Fundamental quality
    total += tier(
        roe,
        &[(25.0, 10), (20.0, 9), (15.0, 7), (10.0, 5), (5.0, 3), (0.0, 1)],
    );
    total += tier(growth, &[(20.0, 5), (15.0, 4), (10.0, 3), (5.0, 2), (0.0, 1)]);
    total += tier(roa, &[(15.0, 5), (10.0, 4), (7.0, 3), (5.0, 2), (2.0, 1)]);

    // Market confidence
    total += tier(
        analysts,
        &[(20.0, 10), (15.0, 9), (10.0, 7), (7.0, 5), (5.0, 3), (3.0, 1)],
    );
    total += match inputs
        .recommendation
        .as_deref()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("strong_buy") => 5,
        Some("buy") => 4,
        Some("hold") => 2,
        Some("strong_sell") => -5,
        _ => 0,
    };

    // Risk penalties
    total -= if volatility > 60.0 {
        10
    } else if volatility > 45.0 {
        6
    } else if volatility > 35.0 {
        3
    } else {
        0
    };
    total -= if beta > 2.0 {
        5
    } else if beta < 0.3 {
        3
    } else {
        0
    };
    total -= if market_cap < 0.5 {
        8
    } else if market_cap < 1.0 {
        5
    } else if market_cap < 2.0 {
        2
    } else {
        0
    };

    // Excellence bonuses
    if upside > 15.0 && pe < 15.0 && roe > 15.0 {
        total += 5;
    }
    if div_yield > 4.0 && growth > 5.0 {
        total += 3;
    }
    if roe > 20.0 && roa > 10.0 && pe < 20.0 {
        total += 2;
    }

    let adj = sector_adjustment(&inputs.sector);
    if pe < 30.0 {
        total += adj.pe_tolerance;
    }
    if div_yield > 3.0 {
        total += adj.div_bonus;
    }
    if volatility > 35.0 {
        total += adj.vol_tolerance;
    }

    total.clamp(0, 100) as u8
}

/// Grade band of a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    Avoid,
    NotRecommended,
    Unattractive,
    Neutral,
    Attractive,
    VeryAttractive,
    Exceptional,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            85.. => Self::Exceptional,
            75..=84 => Self::VeryAttractive,
            65..=74 => Self::Attractive,
            55..=64 => Self::Neutral,
            45..=54 => Self::Unattractive,
            35..=44 => Self::NotRecommended,
            _ => Self::Avoid,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Exceptional => "Exceptional",
            Self::VeryAttractive => "Very attractive",
            Self::Attractive => "Attractive",
            Self::Neutral => "Neutral",
            Self::Unattractive => "Unattractive",
            Self::NotRecommended => "Not recommended",
            Self::Avoid => "Avoid",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
