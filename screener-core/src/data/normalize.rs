//! Raw quote → StockRecord.
//!
//! - Ratio fields arrive as fractions and are converted to percent.
//! - Upside is derived from the analyst mean target.
//! - 1y return and annualized volatility come from the daily closes.
//! - Implausible values are dropped to `None` and reported as alerts rather
//!   than replaced with made-up numbers.

use super::provider::{DataError, RawQuote};
use crate::domain::{Listing, Market, StockRecord};
use crate::screen::score::{score, ScoreInputs};
use serde::Serialize;
use tracing::warn;

/// Trading days per year, for annualizing daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// |upside| above this is treated as a bad analyst target.
pub const MAX_PLAUSIBLE_UPSIDE_PCT: f64 = 50.0;

/// Dividend yields above this are treated as a data error (special dividends,
/// stale price).
pub const MAX_PLAUSIBLE_DIVIDEND_PCT: f64 = 15.0;

/// P/E above this is noise from near-zero earnings.
pub const MAX_PLAUSIBLE_PE: f64 = 1000.0;

/// A value the normalizer refused to keep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub symbol: String,
    pub field: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub record: StockRecord,
    pub alerts: Vec<Alert>,
}

/// Fraction to percent: 0.12 becomes 12.0, -0.2 becomes -20.0.
pub fn to_percent(fraction: f64) -> f64 {
    fraction * 100.0
}

/// Realized return over the closes, percent. Needs at least two valid closes.
pub fn total_return_pct(closes: &[f64]) -> Option<f64> {
    let mut valid = closes.iter().copied().filter(|c| c.is_finite() && *c > 0.0);
    let first = valid.next()?;
    let last = valid.last()?;
    Some((last / first - 1.0) * 100.0)
}

/// Annualized volatility of daily percentage returns, percent.
///
/// Sample standard deviation; needs at least two returns.
pub fn annualized_volatility_pct(closes: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0].is_finite() && w[1].is_finite() && w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0)
}

struct Checker<'a> {
    symbol: &'a str,
    alerts: Vec<Alert>,
}

impl Checker<'_> {
    /// Keep `value` if finite and `plausible`, otherwise record an alert.
    fn keep(
        &mut self,
        field: &'static str,
        value: Option<f64>,
        plausible: impl Fn(f64) -> bool,
        reason: &'static str,
    ) -> Option<f64> {
        let v = value?;
        if v.is_finite() && plausible(v) {
            return Some(v);
        }
        warn!(symbol = self.symbol, field, value = v, reason, "dropping implausible value");
        self.alerts.push(Alert {
            symbol: self.symbol.to_string(),
            field,
            value: v,
            reason,
        });
        None
    }
}

/// Build a record for `listing` from the provider's quote.
///
/// Fails only when no usable price exists; every other gap becomes `None`.
pub fn normalize(
    market: Market,
    listing: &Listing,
    quote: &RawQuote,
) -> Result<Normalized, DataError> {
    let symbol = listing.symbol.as_str();
    let price = quote
        .closes
        .iter()
        .rev()
        .copied()
        .find(|c| c.is_finite() && *c > 0.0)
        .or(quote.price.filter(|p| p.is_finite() && *p > 0.0))
        .ok_or_else(|| DataError::ResponseFormatChanged(format!("no usable price for {symbol}")))?;

    let mut check = Checker {
        symbol,
        alerts: Vec::new(),
    };

    let market_cap = check
        .keep("market_cap", quote.market_cap, |v| v >= 0.0, "negative market cap")
        .unwrap_or(0.0);

    let dividend_yield = check.keep(
        "dividend_yield",
        quote.dividend_yield.map(to_percent),
        |v| (0.0..=MAX_PLAUSIBLE_DIVIDEND_PCT).contains(&v),
        "dividend yield out of range",
    );

    let upside_pct = check.keep(
        "upside_pct",
        quote
            .target_mean_price
            .filter(|t| *t > 0.0)
            .map(|target| (target - price) / price * 100.0),
        |v| v.abs() <= MAX_PLAUSIBLE_UPSIDE_PCT,
        "analyst target too far from price",
    );

    let pe_ratio = check.keep(
        "pe_ratio",
        quote.trailing_pe.or(quote.forward_pe),
        |v| (0.0..=MAX_PLAUSIBLE_PE).contains(&v),
        "P/E negative or implausibly high",
    );

    let roe = check.keep(
        "roe",
        quote.return_on_equity.map(to_percent),
        |v| v.abs() <= 1000.0,
        "ROE out of range",
    );
    let roa = check.keep(
        "roa",
        quote.return_on_assets.map(to_percent),
        |v| v.abs() <= 100.0,
        "ROA out of range",
    );
    let profit_margin = check.keep(
        "profit_margin",
        quote.profit_margin.map(to_percent),
        |v| v.abs() <= 1000.0,
        "profit margin out of range",
    );
    let payout_ratio = check.keep(
        "payout_ratio",
        quote.payout_ratio.map(to_percent),
        |v| v >= 0.0,
        "negative payout ratio",
    );
    let debt_to_equity = check.keep("debt_to_equity", quote.debt_to_equity, |_| true, "not finite");
    let beta = check.keep("beta", quote.beta, |v| v.abs() <= 10.0, "beta out of range");

    let name = if listing.name.is_empty() {
        quote.name.clone().unwrap_or_else(|| symbol.to_string())
    } else {
        listing.name.clone()
    };
    let sector = if listing.sector.is_empty() {
        quote.sector.clone().unwrap_or_else(|| "Other".to_string())
    } else {
        listing.sector.clone()
    };

    let mut record = StockRecord::new(symbol, name, market, sector, price, market_cap);
    record.pe_ratio = pe_ratio;
    record.roe = roe;
    record.roa = roa;
    record.profit_margin = profit_margin;
    record.debt_to_equity = debt_to_equity;
    record.dividend_yield = dividend_yield;
    record.payout_ratio = payout_ratio;
    record.beta = beta;
    record.total_return_1y = total_return_pct(&quote.closes);
    record.upside_pct = upside_pct;
    record.volatility_pct = annualized_volatility_pct(&quote.closes);
    record.num_analysts = quote.num_analysts;

    let inputs = ScoreInputs {
        upside_pct: record.upside_pct,
        dividend_yield: record.dividend_yield,
        pe_ratio: record.pe_ratio,
        price_to_book: quote
            .price_to_book
            .filter(|v| v.is_finite())
            .map(|v| v.min(20.0)),
        roe: record.roe,
        roa: record.roa,
        revenue_growth: quote
            .revenue_growth
            .filter(|v| v.is_finite())
            .map(|v| to_percent(v).clamp(-50.0, 100.0)),
        num_analysts: record.num_analysts,
        recommendation: quote.recommendation.clone(),
        volatility_pct: record.volatility_pct,
        beta: record.beta,
        market_cap_billions: (market_cap > 0.0).then(|| record.market_cap_billions()),
        sector: record.sector.clone(),
    };
    record.score = Some(score(&inputs));

    Ok(Normalized {
        record,
        alerts: check.alerts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Listing {
        Listing {
            symbol: "IBE.MC".into(),
            name: "Iberdrola".into(),
            sector: "Utilities".into(),
        }
    }

    fn quote() -> RawQuote {
        RawQuote {
            symbol: "IBE.MC".into(),
            price: Some(12.0),
            market_cap: Some(80e9),
            trailing_pe: Some(18.5),
            return_on_equity: Some(0.11),
            return_on_assets: Some(0.035),
            dividend_yield: Some(0.045),
            target_mean_price: Some(13.2),
            num_analysts: Some(24),
            beta: Some(0.6),
            closes: vec![10.0, 10.5, 10.2, 11.0, 12.0],
            ..Default::default()
        }
    }

    #[test]
    fn fractions_become_percent() {
        assert!((to_percent(0.045) - 4.5).abs() < 1e-12);
        assert_eq!(to_percent(0.0), 0.0);
        assert!((to_percent(-0.2) + 20.0).abs() < 1e-12);
        assert!((to_percent(1.5) - 150.0).abs() < 1e-12);
    }

    #[test]
    fn negative_ratios_are_scaled_like_positive_ones() {
        let mut q = quote();
        q.return_on_equity = Some(-0.2);
        q.return_on_assets = Some(-0.04);
        q.profit_margin = Some(-0.15);

        let r = normalize(Market::Ibex35, &listing(), &q).unwrap().record;

        assert!((r.roe.unwrap() + 20.0).abs() < 1e-9);
        assert!((r.roa.unwrap() + 4.0).abs() < 1e-9);
        assert!((r.profit_margin.unwrap() + 15.0).abs() < 1e-9);
    }

    #[test]
    fn normalizes_a_clean_quote() {
        let n = normalize(Market::Ibex35, &listing(), &quote()).unwrap();
        let r = &n.record;

        assert!(n.alerts.is_empty());
        assert_eq!(r.price, 12.0);
        assert!((r.upside_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!((r.dividend_yield.unwrap() - 4.5).abs() < 1e-9);
        assert!((r.roe.unwrap() - 11.0).abs() < 1e-9);
        assert!((r.total_return_1y.unwrap() - 20.0).abs() < 1e-9);
        assert!(r.volatility_pct.unwrap() > 0.0);
        assert_eq!(r.sector, "Utilities");
        assert!(r.score.is_some());
    }

    #[test]
    fn implausible_values_are_nulled_with_alerts() {
        let mut q = quote();
        q.target_mean_price = Some(30.0);
        q.dividend_yield = Some(0.22);
        q.trailing_pe = Some(-3.0);

        let n = normalize(Market::Ibex35, &listing(), &q).unwrap();

        assert_eq!(n.record.upside_pct, None);
        assert_eq!(n.record.dividend_yield, None);
        assert_eq!(n.record.pe_ratio, None);
        let fields: Vec<_> = n.alerts.iter().map(|a| a.field).collect();
        assert_eq!(fields, vec!["dividend_yield", "upside_pct", "pe_ratio"]);
    }

    #[test]
    fn missing_fields_stay_none() {
        let q = RawQuote {
            symbol: "IBE.MC".into(),
            price: Some(12.0),
            ..Default::default()
        };
        let r = normalize(Market::Ibex35, &listing(), &q).unwrap().record;

        assert_eq!(r.pe_ratio, None);
        assert_eq!(r.dividend_yield, None);
        assert_eq!(r.upside_pct, None);
        assert_eq!(r.total_return_1y, None);
        assert_eq!(r.volatility_pct, None);
        assert_eq!(r.market_cap, 0.0);
    }

    #[test]
    fn no_price_is_an_error() {
        let q = RawQuote {
            symbol: "IBE.MC".into(),
            ..Default::default()
        };
        assert!(normalize(Market::Ibex35, &listing(), &q).is_err());
    }

    #[test]
    fn volatility_of_constant_series_is_zero() {
        let closes = vec![10.0; 30];
        assert_eq!(annualized_volatility_pct(&closes), Some(0.0));
        assert_eq!(annualized_volatility_pct(&[10.0, 11.0]), None);
    }
}
