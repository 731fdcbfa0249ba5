use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use predictbot_core::config::SimulationConfig;
use predictbot_core::data::{import_snapshots_ndjson, DataStore, SqliteStore};
use predictbot_core::engine::paper::{MockProvider, PaperEngine};
use predictbot_core::engine::BacktestEngine;
use predictbot_core::events::{HistoricalEventSource, MockEventSource};
use predictbot_core::exchange::{BasicFillModel, FeeModel, LatencyModel, RealisticFillModel, SimulatedExchange};
use predictbot_core::strategies::{create_strategy, list_strategies};

#[derive(Parser)]
#[command(name = "pb", about = "predictbot-core -- the honest prediction market backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a YAML configuration file
    Backtest {
        /// Path to a SimulationConfig YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// Export the trade ledger to this CSV path
        #[arg(long)]
        csv_trades: Option<PathBuf>,

        /// Export the equity curve to this CSV path
        #[arg(long)]
        csv_equity: Option<PathBuf>,
    },

    /// Run paper trading against the mock provider for a bounded duration
    Paper {
        /// Path to a SimulationConfig YAML file
        #[arg(short, long)]
        config: PathBuf,

        /// How long to run before stopping, in seconds
        #[arg(long, default_value = "30")]
        duration_secs: u64,

        /// Number of synthetic markets the mock provider generates
        #[arg(long, default_value = "3")]
        markets: usize,

        /// Delay between mock provider ticks, in milliseconds
        #[arg(long, default_value = "50")]
        tick_ms: u64,
    },

    /// List available strategy names and descriptions
    Strategies,

    /// Import newline-delimited JSON market snapshots into a data store
    Import {
        /// Source file: one JSON MarketSnapshot per line
        #[arg(long)]
        source: PathBuf,

        /// Destination SQLite database path
        #[arg(long)]
        dest: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest { config, csv_trades, csv_equity } => cmd_backtest(config, csv_trades, csv_equity),
        Commands::Paper { config, duration_secs, markets, tick_ms } => {
            cmd_paper(config, duration_secs, markets, tick_ms)
        }
        Commands::Strategies => cmd_strategies(),
        Commands::Import { source, dest } => cmd_import(source, dest),
    }
}

fn build_exchange(config: &SimulationConfig) -> SimulatedExchange {
    let fm = &config.exchange.fill_model;
    let fill_model: Box<dyn predictbot_core::exchange::FillModel> = match fm.model_type.as_str() {
        "realistic" => Box::new(RealisticFillModel { price_impact_factor: fm.price_impact_factor }),
        _ => Box::new(BasicFillModel {
            prob_fill_on_limit: fm.prob_fill_on_limit,
            prob_slippage: fm.prob_slippage,
            max_slippage_bps: fm.max_slippage_bps,
        }),
    };
    let lm = &config.exchange.latency_model;
    let latency_model = LatencyModel::new(lm.mean_ms, lm.std_ms, lm.min_ms, lm.max_ms);
    let fee_model = if config.exchange.fee_model.use_platform_fees {
        FeeModel::platform_default()
    } else {
        FeeModel::new(false, config.exchange.fee_model.custom_fee_pct)
    };
    SimulatedExchange::seeded(fill_model, latency_model, fee_model, fm.random_seed)
}

fn build_strategies(names: &[String]) -> Result<Vec<Box<dyn predictbot_core::strategies::Strategy>>> {
    if names.is_empty() {
        bail!("configuration lists no strategies; add at least one under `strategies`");
    }
    names
        .iter()
        .map(|name| {
            create_strategy(name).ok_or_else(|| {
                let known: Vec<&str> = list_strategies().iter().map(|(n, _)| *n).collect();
                anyhow::anyhow!("unknown strategy '{name}'. available: {}", known.join(", "))
            })
        })
        .collect()
}

fn cmd_backtest(config_path: PathBuf, csv_trades: Option<PathBuf>, csv_equity: Option<PathBuf>) -> Result<()> {
    let config = SimulationConfig::from_yaml(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let backtest_config = config
        .backtest
        .as_ref()
        .context("config mode is backtest but no [backtest] section is present")?;

    let exchange = build_exchange(&config);
    let mut engine = BacktestEngine::new(exchange, config.get_initial_capital(), config.get_record_equity_interval())
        .with_risk_limits((&config.risk_limits).into());
    for strategy in build_strategies(&config.strategies)? {
        engine.add_strategy(strategy);
    }

    let results = match (&backtest_config.data_source[..], &backtest_config.data_path) {
        ("historical_db", Some(path)) => {
            let store = SqliteStore::open(std::path::Path::new(path)).with_context(|| format!("opening data store {path}"))?;
            let market_ids = store.list_market_ids().context("listing market ids")?;
            if market_ids.is_empty() {
                bail!("data store at {path} has no snapshots to replay");
            }
            let mut source = HistoricalEventSource::new(&store, market_ids, backtest_config.start_date, backtest_config.end_date);
            engine.run(&mut source)?
        }
        _ => {
            tracing::warn!("no historical data source configured, falling back to the synthetic mock feed");
            let rng = match config.exchange.fill_model.random_seed {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            let mut source = MockEventSource::new(
                backtest_config.platforms.len().max(1) * 2,
                backtest_config.platforms.clone(),
                backtest_config.time_step_minutes,
                backtest_config.start_date,
                rng,
            );
            engine.run(&mut source)?
        }
    };

    results.print_summary();
    if let Some(path) = csv_trades {
        results.export_trades_csv(&path).with_context(|| format!("exporting trades to {}", path.display()))?;
        println!("Trade ledger exported to {}", path.display());
    }
    if let Some(path) = csv_equity {
        results.export_equity_csv(&path).with_context(|| format!("exporting equity curve to {}", path.display()))?;
        println!("Equity curve exported to {}", path.display());
    }
    Ok(())
}

fn cmd_paper(config_path: PathBuf, duration_secs: u64, markets: usize, tick_ms: u64) -> Result<()> {
    let config = SimulationConfig::from_yaml(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().context("building tokio runtime")?;
    runtime.block_on(async move {
        let exchange = build_exchange(&config);
        let mut engine = PaperEngine::new(exchange, config.get_initial_capital(), config.get_record_equity_interval())
            .with_risk_limits((&config.risk_limits).into());
        for strategy in build_strategies(&config.strategies)? {
            engine.add_strategy(strategy);
        }

        let stop_handle = engine.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
            stop_handle.notify_one();
        });

        let platforms = config.get_platforms();
        let rng = ChaCha8Rng::from_entropy();
        let source = MockEventSource::new(markets, platforms, 1, chrono::Utc::now(), rng);
        let provider = MockProvider::new(source, Duration::from_millis(tick_ms));

        println!("Running paper trading against the mock provider for {duration_secs}s...");
        let results = engine.run(vec![Box::new(provider)]).await?;
        results.print_summary();
        Ok(())
    })
}

fn cmd_strategies() -> Result<()> {
    println!();
    println!("Available strategies:");
    println!();
    for (name, description) in list_strategies() {
        println!("  {:<16} {}", name, description);
    }
    println!();
    Ok(())
}

fn cmd_import(source: PathBuf, dest: PathBuf) -> Result<()> {
    let store = SqliteStore::open(&dest).with_context(|| format!("opening destination store {}", dest.display()))?;
    store.init().context("initializing destination schema")?;
    let stats = import_snapshots_ndjson(&source, &store).context("import failed")?;

    println!();
    println!("Import complete:");
    println!("  Snapshots imported: {}", stats.snapshots_imported);
    println!("  Lines skipped:      {}", stats.lines_skipped);
    println!();
    Ok(())
}
