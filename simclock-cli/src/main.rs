//! simclock CLI: inspect schedules and run a demo backtest.
//!
//! Commands:
//! - `schedule`: list the next time events a session (or backtest config) would fire
//! - `run`: buy-and-hold over CSV bars, with a P&L reconstruction cross-check

mod loader;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use simclock_core::backtest::{Backtest, BacktestConfig, BacktestResult, BuyAndHold};
use simclock_core::data::{PresetSource, PriceSource};
use simclock_core::events::EventType;
use simclock_core::pnl::{reconstruct_pnl, PnlSeries};
use simclock_core::time::{Frequency, Scheduler, SessionConfig, TimeEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simclock", about = "simclock: discrete-event backtest clock")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the upcoming time events.
    Schedule {
        /// Backtest TOML config; its session and events are used.
        #[arg(long, conflicts_with = "session")]
        config: Option<PathBuf>,

        /// Session TOML config. Defaults to US equities hours.
        #[arg(long)]
        session: Option<PathBuf>,

        /// Start instant (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS). Defaults to the config start.
        #[arg(long)]
        from: Option<String>,

        /// Number of events to list.
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
    /// Run a buy-and-hold backtest over CSV bars.
    Run {
        /// CSV file with columns symbol,time,open,high,low,close,volume.
        #[arg(long)]
        data: PathBuf,

        /// Backtest TOML config. Without it, --start and --end are required.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Initial cash when no config is given.
        #[arg(long, default_value_t = 100_000.0)]
        cash: f64,

        /// Bar frequency of the CSV (1min, 5min, ..., daily).
        #[arg(long)]
        frequency: Option<Frequency>,

        /// Symbols to hold. Defaults to every symbol in the CSV.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Fraction of cash to invest.
        #[arg(long, default_value_t = 1.0)]
        allocation: f64,

        /// Write the full result as JSON here.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Schedule {
            config,
            session,
            from,
            count,
        } => run_schedule(config, session, from, count),
        Commands::Run {
            data,
            config,
            start,
            end,
            cash,
            frequency,
            symbols,
            allocation,
            output,
        } => run_backtest_cmd(
            &data, config, start, end, cash, frequency, symbols, allocation, output,
        ),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_schedule(
    config_path: Option<PathBuf>,
    session_path: Option<PathBuf>,
    from: Option<String>,
    count: usize,
) -> Result<()> {
    let (session, events, default_from) = match (config_path, session_path) {
        (Some(path), _) => {
            let config = BacktestConfig::load(&path)?;
            let start = config.start.and_time(chrono::NaiveTime::MIN);
            (config.session, config.events, Some(start))
        }
        (None, Some(path)) => (SessionConfig::load(&path)?, all_regular_events(), None),
        (None, None) => (SessionConfig::us_equities(), all_regular_events(), None),
    };

    let from: NaiveDateTime = match (from, default_from) {
        (Some(s), _) => loader::parse_time(&s)?,
        (None, Some(start)) => start,
        (None, None) => bail!("--from is required without --config"),
    };

    let scheduler = Scheduler::with_events(session, events);
    let upcoming = scheduler.upcoming(from, count)?;
    if upcoming.is_empty() {
        println!("No events scheduled after {from}.");
        return Ok(());
    }
    println!("{:<22} {}", "Time", "Event");
    println!("{}", "-".repeat(42));
    for (event, time) in &upcoming {
        let label = match event {
            TimeEvent::OneShot { tag, .. } => format!("one_shot ({tag})"),
            other => other.name().to_string(),
        };
        println!("{:<22} {}", time.format("%Y-%m-%d %H:%M:%S"), label);
    }
    Ok(())
}

fn all_regular_events() -> Vec<TimeEvent> {
    vec![
        TimeEvent::BeforeMarketOpen,
        TimeEvent::MarketOpen,
        TimeEvent::IntradayBar,
        TimeEvent::MarketClose,
        TimeEvent::AfterMarketClose,
    ]
}

#[allow(clippy::too_many_arguments)]
fn run_backtest_cmd(
    data: &Path,
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    cash: f64,
    frequency: Option<Frequency>,
    symbols: Vec<String>,
    allocation: f64,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BacktestConfig::load(&path)?,
        None => {
            let (Some(start), Some(end)) = (start.as_deref(), end.as_deref()) else {
                bail!("--start and --end are required without --config");
            };
            BacktestConfig::new(parse_date(start)?, parse_date(end)?, cash)
        }
    };
    if let Some(frequency) = frequency {
        config = config.with_data_frequency(frequency);
    }
    if !(allocation > 0.0 && allocation <= 1.0) {
        bail!("--allocation must be in (0, 1], got {allocation}");
    }

    let bundle = loader::load_csv(data, config.data_frequency)?;
    let source: Arc<dyn PriceSource> = Arc::new(PresetSource::new(bundle).with_name("csv"));
    let symbols = if symbols.is_empty() {
        source.instruments()
    } else {
        symbols
    };
    info!(symbols = symbols.len(), data = %data.display(), "loaded");

    let result = Backtest::new(config.clone(), Arc::clone(&source))
        .with_listener(BuyAndHold::new(symbols, allocation), &[EventType::MarketOpen])
        .run()?;

    let pnl = reconstruct_pnl(
        &result.transactions,
        source.as_ref(),
        config.start,
        config.end,
        &config.session,
    )?;

    print_summary(&result, &pnl);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
        println!("Result saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult, pnl: &PnlSeries) {
    let config = &result.config;
    println!();
    println!("=== Backtest Result ===");
    println!("Period:         {} to {}", config.start, config.end);
    println!("Frequency:      {}", config.data_frequency);
    println!("Events:         {}", result.summary.dispatched);
    println!("Fills:          {}", result.transactions.len());
    println!("Trades:         {}", result.trades.len());
    println!();
    println!("--- Portfolio ---");
    println!("Initial Cash:   {:.2}", config.initial_cash);
    println!("Final Value:    {:.2}", result.final_value);
    println!("Cash:           {:.2}", result.cash);
    println!("Total Return:   {:.2}%", result.total_return() * 100.0);
    for (symbol, quantity) in &result.open_positions {
        println!("  {symbol:<8} {quantity:>12.2}");
    }
    if !result.trades.is_empty() {
        let winners = result.trades.iter().filter(|t| t.is_winner()).count();
        let returns: f64 = result.trades.iter().map(|t| t.return_pct()).sum();
        let avg_return = returns / result.trades.len() as f64;
        println!();
        println!("--- Trades ---");
        println!("Winners:        {winners} / {}", result.trades.len());
        println!("Avg Return:     {:.2}%", avg_return * 100.0);
    }
    println!();
    println!("--- P&L Reconstruction ---");
    match pnl.last() {
        Some(last) => {
            let diff = result.total_pnl() - last.total;
            println!("Realized:       {:.2}", last.realized);
            println!("Unrealized:     {:.2}", last.unrealized);
            println!("Reconstructed:  {:.2} (as of {})", last.total, last.date);
            println!("Reported:       {:.2}", result.total_pnl());
            if diff.abs() > 1e-6 {
                println!("WARNING: reported and reconstructed P&L differ by {diff:.6}");
            }
        }
        None => println!("(no trading days in range)"),
    }
    println!();
    println!("Fingerprint:    {}", result.fingerprint);
    println!();
}
