//! Yahoo Finance quote provider.
//!
//! Two endpoints per symbol:
//! - v8 chart API: one year of daily closes plus the last traded price.
//! - v10 quoteSummary: fundamentals, analyst targets and the company profile.
//!
//! The chart is required; fundamentals are best effort. When quoteSummary is
//! refused (it sometimes demands a session crumb) the quote is returned with
//! fundamentals empty instead of failing the symbol.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataProvider, RawQuote};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SUMMARY_MODULES: &str = "price,summaryDetail,financialData,defaultKeyStatistics,assetProfile";

// ── Chart API ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Envelope<ChartData>,
}

/// Both endpoints wrap their payload the same way.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<Vec<T>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    long_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

// ── quoteSummary API ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: Envelope<SummaryModules>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryModules {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    financial_data: Option<FinancialData>,
    default_key_statistics: Option<KeyStatistics>,
    asset_profile: Option<AssetProfile>,
}

/// Yahoo's `{"raw": 0.12, "fmt": "12.00%"}` number wrapper.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct Num {
    raw: Option<f64>,
}

fn raw(n: &Option<Num>) -> Option<f64> {
    n.and_then(|n| n.raw).filter(|v| v.is_finite())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<Num>,
    market_cap: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<Num>,
    #[serde(rename = "forwardPE")]
    forward_pe: Option<Num>,
    dividend_yield: Option<Num>,
    payout_ratio: Option<Num>,
    beta: Option<Num>,
    market_cap: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    current_price: Option<Num>,
    target_mean_price: Option<Num>,
    number_of_analyst_opinions: Option<Num>,
    recommendation_key: Option<String>,
    return_on_equity: Option<Num>,
    return_on_assets: Option<Num>,
    profit_margins: Option<Num>,
    revenue_growth: Option<Num>,
    debt_to_equity: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    price_to_book: Option<Num>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

/// HTTP behaviour of the provider.
#[derive(Debug, Clone)]
pub struct YahooSettings {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Yahoo Finance quote provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    settings: YahooSettings,
}

impl YahooProvider {
    pub fn new(settings: YahooSettings, circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            settings,
        })
    }

    fn chart_url(symbol: &str) -> String {
        format!("https://query2.finance.yahoo.com/v8/finance/chart/{symbol}?range=1y&interval=1d")
    }

    fn summary_url(symbol: &str) -> String {
        format!(
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{symbol}?modules={SUMMARY_MODULES}"
        )
    }

    /// GET + JSON decode with retry, backoff and circuit breaker.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            debug!(
                symbol,
                cooldown_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
                "circuit breaker open, skipping request"
            );
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.settings.base_delay, attempt);
                debug!(symbol, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(format!(
                    "Yahoo Finance refused {symbol} without a session"
                )));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp.json::<T>().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

/// Exponential backoff before retry `attempt` (1-based), saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

fn unwrap_envelope<T>(symbol: &str, envelope: Envelope<T>) -> Result<T, DataError> {
    let Envelope { result, error } = envelope;
    match (result.and_then(|r| r.into_iter().next()), error) {
        (Some(data), _) => Ok(data),
        (None, Some(err)) if err.code == "Not Found" => Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        }),
        (None, Some(err)) => Err(DataError::ResponseFormatChanged(format!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        ))),
        (None, None) => Err(DataError::ResponseFormatChanged("empty result with no error".into())),
    }
}

/// Closes (nulls dropped) and chart metadata into a quote skeleton.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<RawQuote, DataError> {
    let data = unwrap_envelope(symbol, resp.chart)?;
    let closes: Vec<f64> = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close.into_iter().flatten().filter(|c| c.is_finite()).collect())
        .unwrap_or_default();

    let meta = data.meta;
    let price = meta.as_ref().and_then(|m| m.regular_market_price);
    if closes.is_empty() && price.is_none() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }

    Ok(RawQuote {
        symbol: symbol.to_string(),
        name: meta.and_then(|m| m.long_name),
        price,
        closes,
        ..Default::default()
    })
}

/// Fill a quote's fundamentals from a quoteSummary payload.
fn merge_summary(quote: &mut RawQuote, modules: SummaryModules) {
    let price = modules.price.unwrap_or_default();
    let detail = modules.summary_detail.unwrap_or_default();
    let financial = modules.financial_data.unwrap_or_default();
    let stats = modules.default_key_statistics.unwrap_or_default();

    if quote.name.is_none() {
        quote.name = price.long_name.or(price.short_name);
    }
    quote.sector = modules.asset_profile.and_then(|p| p.sector);
    quote.price = quote
        .price
        .or(raw(&price.regular_market_price))
        .or(raw(&financial.current_price));
    quote.market_cap = raw(&price.market_cap).or(raw(&detail.market_cap));
    quote.trailing_pe = raw(&detail.trailing_pe);
    quote.forward_pe = raw(&detail.forward_pe);
    quote.price_to_book = raw(&stats.price_to_book);
    quote.return_on_equity = raw(&financial.return_on_equity);
    quote.return_on_assets = raw(&financial.return_on_assets);
    quote.profit_margin = raw(&financial.profit_margins);
    quote.revenue_growth = raw(&financial.revenue_growth);
    quote.debt_to_equity = raw(&financial.debt_to_equity);
    quote.dividend_yield = raw(&detail.dividend_yield);
    quote.payout_ratio = raw(&detail.payout_ratio);
    quote.beta = raw(&detail.beta);
    quote.target_mean_price = raw(&financial.target_mean_price);
    quote.num_analysts = raw(&financial.number_of_analyst_opinions)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32);
    quote.recommendation = financial.recommendation_key.filter(|k| k != "none");
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, DataError> {
        let chart: ChartResponse = self.get_json(&Self::chart_url(symbol), symbol)?;
        let mut quote = parse_chart(symbol, chart)?;

        let summary = self
            .get_json::<SummaryResponse>(&Self::summary_url(symbol), symbol)
            .and_then(|resp| unwrap_envelope(symbol, resp.quote_summary));

        match summary {
            Ok(modules) => merge_summary(&mut quote, modules),
            Err(DataError::CircuitBreakerTripped) => return Err(DataError::CircuitBreakerTripped),
            Err(e) => warn!(symbol, error = %e, "fundamentals unavailable, keeping price history only"),
        }

        Ok(quote)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
