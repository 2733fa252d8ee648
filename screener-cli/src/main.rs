//! Screener CLI: refresh, screen, and cache management commands.
//!
//! Commands:
//! - `refresh`: fetch quotes for one or more markets and replace their snapshots
//! - `screen`: filter and rank cached snapshots
//! - `filters`: show the default filter table and how given flags differ from it
//! - `cache status`: report snapshot size, record count and age per market
//! - `cache clear`: delete cached snapshots

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use screener_core::data::store::human_size;
use screener_core::data::{
    CircuitBreaker, Freshness, MarketDataProvider, StdoutProgress, SyntheticProvider,
    YahooProvider,
};
use screener_core::domain::{Market, Universe};
use screener_core::screen::{
    FilterPhase, FilterState, Grade, Predicate, RankMetric, SortDirection, PREDICATES,
};
use screener_core::{RefreshOutcome, Screen, ScreenStatus, Screener, ScreenerConfig};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "screener", about = "Stock screener: filter and rank cached market snapshots")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file). Defaults to ./data.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch quotes and replace the cached snapshot of each market.
    Refresh {
        /// Markets to refresh (IBEX35, MEDIUM_CAP_SPAIN, SP500, NASDAQ).
        markets: Vec<String>,

        /// Refresh every market.
        #[arg(long, default_value_t = false)]
        all: bool,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Filter and rank cached snapshots.
    Screen {
        /// Market to include (repeat for a combined view).
        #[arg(long = "market", required = true)]
        markets: Vec<String>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Sort metric (upside, expected_return, pe, score, ...).
        #[arg(long)]
        sort: Option<String>,

        /// Sort ascending (default: the metric's natural direction).
        #[arg(long, default_value_t = false, conflicts_with = "descending")]
        ascending: bool,

        /// Sort descending.
        #[arg(long, default_value_t = false)]
        descending: bool,

        /// Show only the first N rows.
        #[arg(long)]
        top: Option<usize>,

        /// Refresh markets whose snapshot is missing or older than max_age_hours.
        #[arg(long, default_value_t = false)]
        refresh_stale: bool,

        #[command(flatten)]
        source: SourceArgs,

        /// Print the screen as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the filter table and which criteria the given flags change.
    Filters {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report snapshot size, record count and age per market.
    Status,
    /// Delete cached snapshots.
    Clear {
        /// Only this market (default: every market).
        #[arg(long)]
        market: Option<String>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Use seeded synthetic quotes instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for synthetic quotes.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Args)]
struct FilterArgs {
    /// Minimum upside to analyst target (%).
    #[arg(long, allow_negative_numbers = true)]
    min_upside: Option<f64>,

    /// Minimum realized 1y return (%).
    #[arg(long, allow_negative_numbers = true)]
    min_total_return: Option<f64>,

    /// Maximum P/E.
    #[arg(long, allow_negative_numbers = true)]
    max_pe: Option<f64>,

    /// Minimum ROE (%).
    #[arg(long, allow_negative_numbers = true)]
    min_roe: Option<f64>,

    /// Maximum annualized volatility (%).
    #[arg(long, allow_negative_numbers = true)]
    max_volatility: Option<f64>,

    /// Minimum dividend yield (%).
    #[arg(long, allow_negative_numbers = true)]
    min_dividend: Option<f64>,

    /// Minimum market cap (billions).
    #[arg(long, allow_negative_numbers = true)]
    min_market_cap: Option<f64>,

    /// Minimum number of analysts.
    #[arg(long, allow_negative_numbers = true)]
    min_analysts: Option<f64>,

    /// Sector to include (repeat for several; default: all).
    #[arg(long = "sector")]
    sectors: Vec<String>,
}

impl FilterArgs {
    fn to_state(&self) -> Result<FilterState> {
        let bounds = [
            (Predicate::MinUpside, self.min_upside),
            (Predicate::MinTotalReturn, self.min_total_return),
            (Predicate::MaxPe, self.max_pe),
            (Predicate::MinRoe, self.min_roe),
            (Predicate::MaxVolatility, self.max_volatility),
            (Predicate::MinDividend, self.min_dividend),
            (Predicate::MinMarketCap, self.min_market_cap),
            (Predicate::MinAnalysts, self.min_analysts),
        ];

        let mut state = FilterState::default();
        for (predicate, value) in bounds {
            if let Some(v) = value {
                state = state.with_bound(predicate, v)?;
            }
        }
        Ok(state.with_sectors(self.sectors.iter().cloned()))
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ScreenerConfig::from_file(path)?,
        None => ScreenerConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    debug!(?config, "loaded configuration");
    let screener = Screener::from_config(config)?;

    match cli.command {
        Commands::Refresh {
            markets,
            all,
            source,
        } => run_refresh(&screener, &markets, all, &source),
        Commands::Screen {
            markets,
            filters,
            sort,
            ascending,
            descending,
            top,
            refresh_stale,
            source,
            json,
        } => {
            let order = SortArgs {
                sort,
                ascending,
                descending,
                top,
            };
            run_screen(&screener, &markets, &filters, &order, refresh_stale, &source, json)
        }
        Commands::Filters { filters } => run_filters(&filters),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&screener),
            CacheAction::Clear { market, confirm } => {
                run_cache_clear(&screener, market.as_deref(), confirm)
            }
        },
    }
}

fn parse_markets(keys: &[String]) -> Result<Vec<Market>> {
    let mut markets = Vec::with_capacity(keys.len());
    for key in keys {
        let market: Market = key.parse()?;
        if !markets.contains(&market) {
            markets.push(market);
        }
    }
    Ok(markets)
}

fn build_provider(screener: &Screener, source: &SourceArgs) -> Result<Box<dyn MarketDataProvider>> {
    if source.synthetic {
        return Ok(Box::new(SyntheticProvider::new(source.seed)));
    }
    let yahoo = &screener.config().yahoo;
    let breaker = Arc::new(CircuitBreaker::new(
        yahoo.breaker_cooldown(),
        yahoo.breaker_failure_threshold,
    ));
    Ok(Box::new(YahooProvider::new(yahoo.settings(), breaker)?))
}

fn run_refresh(screener: &Screener, keys: &[String], all: bool, source: &SourceArgs) -> Result<()> {
    let markets = if all {
        Market::ALL.to_vec()
    } else {
        parse_markets(keys)?
    };
    if markets.is_empty() {
        bail!("name at least one market or pass --all");
    }

    let provider = build_provider(screener, source)?;
    let progress = StdoutProgress;
    let mut failed_markets = 0;

    for market in markets {
        match screener.refresh(market, provider.as_ref(), Utc::now(), &progress) {
            Ok(summary) => {
                println!(
                    "{market}: saved {} of {} symbols{}",
                    summary.saved,
                    summary.total,
                    if summary.unchanged { " (unchanged)" } else { "" }
                );
                for (symbol, err) in &summary.failures {
                    eprintln!("  skipped {symbol}: {err}");
                }
                for alert in &summary.alerts {
                    eprintln!(
                        "  alert {}: {} = {:.2} ({})",
                        alert.symbol, alert.field, alert.value, alert.reason
                    );
                }
            }
            Err(e) => {
                eprintln!("{market}: refresh failed: {e}");
                failed_markets += 1;
            }
        }
    }

    if failed_markets > 0 {
        std::process::exit(1);
    }
    Ok(())
}

struct SortArgs {
    sort: Option<String>,
    ascending: bool,
    descending: bool,
    top: Option<usize>,
}

fn run_screen(
    screener: &Screener,
    keys: &[String],
    filters: &FilterArgs,
    order: &SortArgs,
    refresh_stale: bool,
    source: &SourceArgs,
    json: bool,
) -> Result<()> {
    let markets = parse_markets(keys)?;
    let state = filters.to_state()?;
    for sector in unlisted_sectors(screener.universe(), &markets, &state) {
        eprintln!("WARNING: no {} listing is in sector '{sector}'", join_markets(&markets));
    }

    let mut screen = if refresh_stale {
        let provider = build_provider(screener, source)?;
        let mut snapshots = Vec::with_capacity(markets.len());
        for &market in &markets {
            let loaded = screener.load_or_refresh(market, provider.as_ref(), Utc::now(), &StdoutProgress)?;
            if let RefreshOutcome::Failed(e) = &loaded.refresh {
                eprintln!("WARNING: {market} refresh failed ({e}); showing stale data");
            }
            snapshots.push(loaded.snapshot);
        }
        screener.screen(&snapshots, &state)
    } else {
        screener.load_and_filter_many(&markets, &state)?
    };

    let metric = match &order.sort {
        Some(s) => s.parse::<RankMetric>().map_err(anyhow::Error::msg)?,
        None => screener.config().default_sort,
    };
    let direction = if order.ascending {
        SortDirection::Ascending
    } else if order.descending {
        SortDirection::Descending
    } else {
        metric.natural_direction()
    };
    screen = screen.sorted_by(metric, direction);
    if let Some(n) = order.top {
        screen = screen.top(n);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&screen)?);
        return Ok(());
    }

    print_screen(&screen);
    Ok(())
}

/// Selected sectors that no listing of `markets` belongs to.
fn unlisted_sectors<'a>(universe: &Universe, markets: &[Market], state: &'a FilterState) -> Vec<&'a str> {
    let known: BTreeSet<&str> = markets.iter().flat_map(|&m| universe.sectors(m)).collect();
    state
        .sectors()
        .iter()
        .map(String::as_str)
        .filter(|s| !known.contains(s))
        .collect()
}

fn join_markets(markets: &[Market]) -> String {
    markets.iter().map(Market::key).collect::<Vec<_>>().join("/")
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) => format!("{x:.decimals$}"),
        None => "-".to_string(),
    }
}

fn print_screen(screen: &Screen) {
    let names: Vec<&str> = screen.markets.iter().map(|m| m.display_name()).collect();
    println!();
    println!("=== {} ===", names.join(" + "));
    for (market, at) in &screen.refreshed_at {
        println!(
            "{market} data as of {} (prices in {})",
            at.format("%Y-%m-%d %H:%M UTC"),
            market.currency()
        );
    }
    println!(
        "Retained {} of {} (sorted by {} {})",
        screen.summary.retained,
        screen.summary.total,
        screen.sort,
        match screen.direction {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    );

    if !screen.changes.is_empty() {
        println!();
        println!("Active filters:");
        for change in &screen.changes {
            println!("  {change}");
        }
    }

    match screen.status {
        ScreenStatus::EmptySnapshot => {
            println!();
            println!("The snapshot contains no records.");
            return;
        }
        ScreenStatus::AllFiltered => {
            println!();
            println!("No stocks match the current filters. Excluded by:");
            for e in screen.exclusions.iter().filter(|e| e.excluded > 0) {
                println!("  {:<18} {}", e.criterion.to_string(), e.excluded);
            }
            return;
        }
        ScreenStatus::Populated => {}
    }

    println!();
    println!(
        "{:<10} {:<24} {:<14} {:>10} {:>8} {:>7} {:>7} {:>7} {:>7} {:>6}  {}",
        "Symbol", "Name", "Sector", "Price", "Upside%", "Div%", "Ret1y%", "P/E", "Vol%", "Score", "Grade"
    );
    println!("{}", "-".repeat(122));
    for r in &screen.records {
        let grade = r.score.map(|s| Grade::from_score(s).label()).unwrap_or("-");
        let name: String = r.name.chars().take(24).collect();
        let sector: String = r.sector.chars().take(14).collect();
        println!(
            "{:<10} {:<24} {:<14} {:>10.2} {:>8} {:>7} {:>7} {:>7} {:>7} {:>6}  {}",
            r.symbol,
            name,
            sector,
            r.price,
            fmt_opt(r.upside_pct, 1),
            fmt_opt(r.dividend_yield, 2),
            fmt_opt(r.total_return_1y, 1),
            fmt_opt(r.pe_ratio, 1),
            fmt_opt(r.effective_volatility(), 1),
            r.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            grade
        );
    }

    let s = &screen.summary;
    println!();
    println!("--- Summary ---");
    println!("Mean upside:       {}%", fmt_opt(s.mean_upside, 1));
    println!("Mean dividend:     {}%", fmt_opt(s.mean_dividend, 2));
    println!("Mean 1y return:    {}%", fmt_opt(s.mean_total_return, 1));
    println!("Mean volatility:   {}%", fmt_opt(s.mean_volatility, 1));
    println!("Mean score:        {}", fmt_opt(s.mean_score, 1));
    println!();
    println!(
        "{:<20} {:>5} {:>7} {:>8} {:>6} {:>7} {:>6} {:>6}",
        "Sector", "Count", "Ret1y%", "Upside%", "Div%", "P/E", "ROE%", "Vol%"
    );
    for x in &s.sectors {
        let sector: String = x.sector.chars().take(20).collect();
        println!(
            "{:<20} {:>5} {:>7} {:>8} {:>6} {:>7} {:>6} {:>6}",
            sector,
            x.count,
            fmt_opt(x.mean_total_return, 1),
            fmt_opt(x.mean_upside, 1),
            fmt_opt(x.mean_dividend, 2),
            fmt_opt(x.mean_pe, 1),
            fmt_opt(x.mean_roe, 1),
            fmt_opt(x.mean_volatility, 1),
        );
    }
    if s.by_market.len() > 1 {
        println!("Markets:");
        for (market, count) in &s.by_market {
            println!("  {market:<20} {count}");
        }
    }
    println!("Display height:    {} px", s.display_size);
    println!();
}

fn run_filters(filters: &FilterArgs) -> Result<()> {
    let state = filters.to_state()?;

    println!("{:<18} {:<26} {:<4} {:>10} {:>12}", "Filter", "Description", "Kind", "Default", "Current");
    println!("{}", "-".repeat(74));
    for spec in &PREDICATES {
        let kind = match spec.kind {
            screener_core::screen::BoundKind::Min => "min",
            screener_core::screen::BoundKind::Max => "max",
        };
        println!(
            "{:<18} {:<26} {:<4} {:>10} {:>12}",
            spec.key,
            spec.label,
            kind,
            format!("{}{}", spec.default, spec.unit),
            format!("{}{}", state.bound(spec.predicate), spec.unit)
        );
    }
    let sectors = if state.sectors().is_empty() {
        "all".to_string()
    } else {
        state.sectors().iter().cloned().collect::<Vec<_>>().join(", ")
    };
    println!("{:<18} {:<26} {:<4} {:>10} {:>12}", "sector", "Sector selection", "set", "all", sectors);

    println!();
    match state.phase() {
        FilterPhase::Default => println!("All filters at their defaults."),
        FilterPhase::Customized => {
            println!("Changed from default:");
            for change in state.describe() {
                println!("  {change}");
            }
        }
    }
    Ok(())
}

fn run_cache_status(screener: &Screener) -> Result<()> {
    let now = Utc::now();
    let statuses = screener.store().status(&Market::ALL);

    println!("Cache: {}", screener.store().layout().data_dir().display());
    println!("Max age: {}h", screener.config().max_age_hours);
    println!();
    println!("{:<18} {:>8} {:>10} {:<22} {}", "Market", "Records", "Size", "Refreshed", "State");
    println!("{}", "-".repeat(72));

    for status in &statuses {
        let state = match screener.freshness(status.market, now) {
            Freshness::Missing => "missing".to_string(),
            Freshness::Fresh { age } => format!("fresh ({}h old)", age.num_hours()),
            Freshness::Stale { age } if age == chrono::Duration::MAX => "unreadable".to_string(),
            Freshness::Stale { age } => format!("stale ({}h old)", age.num_hours()),
        };
        println!(
            "{:<18} {:>8} {:>10} {:<22} {}",
            status.market.key(),
            status.record_count.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            status.size_bytes.map(human_size).unwrap_or_else(|| "-".into()),
            status
                .refreshed_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into()),
            state
        );
    }
    Ok(())
}

fn run_cache_clear(screener: &Screener, market: Option<&str>, confirm: bool) -> Result<()> {
    let markets = match market {
        Some(key) => vec![key.parse::<Market>()?],
        None => Market::ALL.to_vec(),
    };
    let present: Vec<Market> = markets
        .into_iter()
        .filter(|m| screener.store().exists(*m))
        .collect();

    if present.is_empty() {
        println!("Nothing cached to remove.");
        return Ok(());
    }

    println!("Cached snapshots:");
    for m in &present {
        let size = screener.store().size_bytes(*m).unwrap_or(0);
        println!("  {m} ({})", human_size(size));
    }

    if !confirm {
        println!();
        println!("Dry run: pass --confirm to actually delete.");
        return Ok(());
    }

    for m in &present {
        screener
            .store()
            .remove(*m)
            .with_context(|| format!("failed to clear {m}"))?;
        println!("Removed: {m}");
    }
    println!("Done. Removed {} snapshot(s).", present.len());
    Ok(())
}
