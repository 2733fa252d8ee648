//! Ranking and aggregation of the retained records.

use crate::domain::{Market, StockRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Column a screen can be sorted by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Upside,
    TotalReturn,
    /// Upside plus dividend yield.
    #[default]
    ExpectedReturn,
    Pe,
    Roe,
    Roa,
    Dividend,
    MarketCap,
    Volatility,
    Beta,
    Score,
    Price,
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl RankMetric {
    pub const ALL: [RankMetric; 13] = [
        RankMetric::Upside,
        RankMetric::TotalReturn,
        RankMetric::ExpectedReturn,
        RankMetric::Pe,
        RankMetric::Roe,
        RankMetric::Roa,
        RankMetric::Dividend,
        RankMetric::MarketCap,
        RankMetric::Volatility,
        RankMetric::Beta,
        RankMetric::Score,
        RankMetric::Price,
        RankMetric::Symbol,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::Upside => "upside",
            Self::TotalReturn => "total_return",
            Self::ExpectedReturn => "expected_return",
            Self::Pe => "pe",
            Self::Roe => "roe",
            Self::Roa => "roa",
            Self::Dividend => "dividend",
            Self::MarketCap => "market_cap",
            Self::Volatility => "volatility",
            Self::Beta => "beta",
            Self::Score => "score",
            Self::Price => "price",
            Self::Symbol => "symbol",
        }
    }

    /// Direction in which "better" comes first: cheap, calm and alphabetical
    /// ascend, everything else descends.
    pub fn natural_direction(&self) -> SortDirection {
        match self {
            Self::Pe | Self::Volatility | Self::Beta | Self::Symbol => SortDirection::Ascending,
            _ => SortDirection::Descending,
        }
    }

    /// Numeric value of the metric. `None` for `Symbol` and for missing data.
    pub fn value(&self, record: &StockRecord) -> Option<f64> {
        let v = match self {
            Self::Upside => record.upside_pct,
            Self::TotalReturn => record.total_return_1y,
            Self::ExpectedReturn => record.expected_return(),
            Self::Pe => record.pe_ratio,
            Self::Roe => record.roe,
            Self::Roa => record.roa,
            Self::Dividend => record.dividend_yield,
            Self::MarketCap => Some(record.market_cap),
            Self::Volatility => record.effective_volatility(),
            Self::Beta => record.beta,
            Self::Score => record.score.map(f64::from),
            Self::Price => Some(record.price),
            Self::Symbol => None,
        };
        v.filter(|x| !x.is_nan())
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        let alias = match wanted.as_str() {
            "pe_ratio" | "per" => "pe",
            "dividend_yield" | "yield" => "dividend",
            "total_return_1y" | "return" => "total_return",
            "expected" => "expected_return",
            "upside_pct" => "upside",
            "market_capitalization" | "cap" => "market_cap",
            other => other,
        };
        Self::ALL
            .into_iter()
            .find(|m| m.key() == alias)
            .ok_or_else(|| {
                let keys: Vec<_> = Self::ALL.iter().map(|m| m.key()).collect();
                format!("unknown sort metric '{s}' (expected one of: {})", keys.join(", "))
            })
    }
}

fn compare(metric: RankMetric, direction: SortDirection, a: &StockRecord, b: &StockRecord) -> Ordering {
    let ordered = |ord: Ordering| match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    };

    if metric == RankMetric::Symbol {
        return ordered(a.symbol.cmp(&b.symbol));
    }

    // Missing values sort last regardless of direction.
    match (metric.value(a), metric.value(b)) {
        (Some(x), Some(y)) => ordered(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort: records with equal keys keep their input order.
pub fn rank(records: &mut [StockRecord], metric: RankMetric, direction: SortDirection) {
    records.sort_by(|a, b| compare(metric, direction, a, b));
}

/// Keep the first `n` records.
pub fn top(mut records: Vec<StockRecord>, n: usize) -> Vec<StockRecord> {
    records.truncate(n);
    records
}

/// Chart/table height policy: a floor, a per-row step and a ceiling (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub min_height: u32,
    pub per_row: u32,
    pub max_height: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            min_height: 600,
            per_row: 20,
            max_height: 2400,
        }
    }
}

impl DisplayConfig {
    /// Monotonic non-decreasing in `rows`, always within `[min_height, max_height]`.
    pub fn display_size(&self, rows: usize) -> u32 {
        let ceiling = self.max_height.max(self.min_height);
        let rows = u32::try_from(rows).unwrap_or(u32::MAX);
        rows.saturating_mul(self.per_row)
            .max(self.min_height)
            .min(ceiling)
    }
}

/// Per-sector aggregate over the retained records. Means skip missing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorSummary {
    pub sector: String,
    pub count: usize,
    pub mean_total_return: Option<f64>,
    pub mean_upside: Option<f64>,
    pub mean_dividend: Option<f64>,
    pub mean_pe: Option<f64>,
    pub mean_roe: Option<f64>,
    pub mean_volatility: Option<f64>,
}

/// Aggregate figures over a screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub retained: usize,
    pub by_sector: BTreeMap<String, usize>,
    /// Best mean total return first; sectors without one go last.
    pub sectors: Vec<SectorSummary>,
    pub by_market: BTreeMap<Market, usize>,
    pub mean_upside: Option<f64>,
    pub mean_dividend: Option<f64>,
    pub mean_total_return: Option<f64>,
    pub mean_volatility: Option<f64>,
    pub mean_score: Option<f64>,
    pub display_size: u32,
}

/// Mean over present, non-NaN values; `None` if there are none.
pub fn mean<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Group `records` by sector and aggregate each group.
pub fn sector_summaries(records: &[StockRecord]) -> Vec<SectorSummary> {
    let mut groups: BTreeMap<&str, Vec<&StockRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.sector.as_str()).or_default().push(r);
    }

    let mut sectors: Vec<SectorSummary> = groups
        .into_iter()
        .map(|(sector, rs)| SectorSummary {
            sector: sector.to_string(),
            count: rs.len(),
            mean_total_return: mean(rs.iter().map(|r| r.total_return_1y)),
            mean_upside: mean(rs.iter().map(|r| r.upside_pct)),
            mean_dividend: mean(rs.iter().map(|r| r.dividend_yield)),
            mean_pe: mean(rs.iter().map(|r| r.pe_ratio)),
            mean_roe: mean(rs.iter().map(|r| r.roe)),
            mean_volatility: mean(rs.iter().map(|r| r.effective_volatility())),
        })
        .collect();

    // Groups come out in name order, so a stable sort keeps ties alphabetical.
    sectors.sort_by(|a, b| match (a.mean_total_return, b.mean_total_return) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    sectors
}

/// Summarize `retained` out of `total` records.
pub fn summarize(total: usize, retained: &[StockRecord], display: &DisplayConfig) -> Summary {
    let mut by_sector = BTreeMap::new();
    let mut by_market = BTreeMap::new();
    for r in retained {
        *by_sector.entry(r.sector.clone()).or_insert(0) += 1;
        *by_market.entry(r.market).or_insert(0) += 1;
    }

    Summary {
        total,
        retained: retained.len(),
        by_sector,
        sectors: sector_summaries(retained),
        by_market,
        mean_upside: mean(retained.iter().map(|r| r.upside_pct)),
        mean_dividend: mean(retained.iter().map(|r| r.dividend_yield)),
        mean_total_return: mean(retained.iter().map(|r| r.total_return_1y)),
        mean_volatility: mean(retained.iter().map(|r| r.effective_volatility())),
        mean_score: mean(retained.iter().map(|r| r.score.map(f64::from))),
        display_size: display.display_size(retained.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(symbol: &str, upside: Option<f64>) -> StockRecord {
        let mut r = StockRecord::new(symbol, symbol, Market::Ibex35, "Banking", 10.0, 1e9);
        r.upside_pct = upside;
        r
    }

    fn symbols(records: &[StockRecord]) -> Vec<&str> {
        records.iter().map(|r| r.symbol.as_str()).collect()
    }

    #[test]
    fn descending_sort_is_stable() {
        let mut records = vec![rec("A", Some(10.0)), rec("B", Some(10.0)), rec("C", Some(5.0))];
        rank(&mut records, RankMetric::Upside, SortDirection::Descending);
        assert_eq!(symbols(&records), vec!["A", "B", "C"]);
    }

    #[test]
    fn nulls_sort_last_in_both_directions() {
        let mut records = vec![rec("N", None), rec("A", Some(1.0)), rec("B", Some(2.0))];

        rank(&mut records, RankMetric::Upside, SortDirection::Descending);
        assert_eq!(symbols(&records), vec!["B", "A", "N"]);

        rank(&mut records, RankMetric::Upside, SortDirection::Ascending);
        assert_eq!(symbols(&records), vec!["A", "B", "N"]);
    }

    #[test]
    fn symbol_sort_is_lexical() {
        let mut records = vec![rec("SAN.MC", None), rec("BBVA.MC", None), rec("ITX.MC", None)];
        rank(&mut records, RankMetric::Symbol, SortDirection::Ascending);
        assert_eq!(symbols(&records), vec!["BBVA.MC", "ITX.MC", "SAN.MC"]);
    }

    #[test]
    fn expected_return_adds_dividend() {
        let mut a = rec("A", Some(5.0));
        a.dividend_yield = Some(6.0);
        let b = rec("B", Some(10.0));
        let mut records = vec![b, a];
        rank(&mut records, RankMetric::default(), SortDirection::Descending);
        assert_eq!(symbols(&records), vec!["A", "B"]);
    }

    #[test]
    fn top_truncates() {
        let records = vec![rec("A", None), rec("B", None), rec("C", None)];
        assert_eq!(symbols(&top(records.clone(), 2)), vec!["A", "B"]);
        assert_eq!(top(records, 10).len(), 3);
    }

    #[test]
    fn display_size_policy() {
        let d = DisplayConfig::default();
        assert_eq!(d.display_size(0), 600);
        assert_eq!(d.display_size(30), 600);
        assert_eq!(d.display_size(35), 700);
        assert_eq!(d.display_size(500), 2400);
    }

    #[test]
    fn summary_skips_nulls() {
        let mut a = rec("A", Some(10.0));
        a.sector = "Energy".into();
        let b = rec("B", None);
        let c = rec("C", Some(20.0));
        let s = summarize(5, &[a, b, c], &DisplayConfig::default());

        assert_eq!(s.total, 5);
        assert_eq!(s.retained, 3);
        assert_eq!(s.by_sector["Banking"], 2);
        assert_eq!(s.by_sector["Energy"], 1);
        assert_eq!(s.by_market[&Market::Ibex35], 3);
        assert_eq!(s.mean_upside, Some(15.0));
        assert_eq!(s.mean_dividend, None);
    }

    #[test]
    fn sector_aggregates_skip_nulls_and_sort_by_return() {
        let mut bank_a = rec("BBVA.MC", Some(10.0));
        bank_a.total_return_1y = Some(30.0);
        bank_a.pe_ratio = Some(8.0);
        bank_a.roe = Some(14.0);
        bank_a.dividend_yield = Some(6.0);
        let mut bank_b = rec("SAN.MC", None);
        bank_b.total_return_1y = Some(10.0);
        bank_b.pe_ratio = None;
        bank_b.roe = Some(12.0);
        bank_b.volatility_pct = Some(25.0);

        let mut energy = rec("REP.MC", Some(5.0));
        energy.sector = "Energy".into();
        energy.total_return_1y = Some(40.0);
        energy.beta = Some(1.5);

        let mut pharma = rec("PHM.MC", Some(1.0));
        pharma.sector = "Pharma".into();

        let mut utility = rec("IBE.MC", None);
        utility.sector = "Utilities".into();
        utility.total_return_1y = Some(20.0);

        let s = summarize(
            5,
            &[pharma, bank_a, energy, bank_b, utility],
            &DisplayConfig::default(),
        );
        let order: Vec<_> = s.sectors.iter().map(|x| x.sector.as_str()).collect();
        assert_eq!(order, vec!["Energy", "Banking", "Utilities", "Pharma"]);

        let banking = &s.sectors[1];
        assert_eq!(banking.count, 2);
        assert_eq!(banking.mean_total_return, Some(20.0));
        assert_eq!(banking.mean_upside, Some(10.0));
        assert_eq!(banking.mean_pe, Some(8.0));
        assert_eq!(banking.mean_roe, Some(13.0));
        assert_eq!(banking.mean_dividend, Some(6.0));
        assert_eq!(banking.mean_volatility, Some(25.0));

        assert_eq!(s.sectors[0].mean_volatility, Some(30.0));
        assert_eq!(s.sectors[3].mean_total_return, None);
        assert_eq!(s.sectors[3].mean_pe, None);
    }

    #[test]
    fn sector_ties_break_by_name() {
        let mut b = rec("B", None);
        b.sector = "Zinc".into();
        b.total_return_1y = Some(5.0);
        let mut a = rec("A", None);
        a.sector = "Aluminium".into();
        a.total_return_1y = Some(5.0);

        let sectors = sector_summaries(&[b, a]);
        assert_eq!(sectors[0].sector, "Aluminium");
        assert_eq!(sectors[1].sector, "Zinc");
        assert!(sector_summaries(&[]).is_empty());
    }

    #[test]
    fn parse_metrics() {
        assert_eq!("pe_ratio".parse::<RankMetric>().unwrap(), RankMetric::Pe);
        assert_eq!("Expected-Return".parse::<RankMetric>().unwrap(), RankMetric::ExpectedReturn);
        assert!("colour".parse::<RankMetric>().is_err());
    }
}
