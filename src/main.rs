//! token-ladder: screen tokens, open positions for the winners and monitor
//! them until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use token_ladder::config::{AppConfig, ExecutionMode};
use token_ladder::scoring::data_sources::{StaticHistorySource, StaticHolderSource, StaticLockSource};
use token_ladder::scoring::{AssembledFeed, DexScreenerClient, ScreenerBuilder};
use token_ladder::trading::{
    ExecutionVenue, HttpExecutionVenue, PaperVenue, TradeMonitor, TradeOnboarder, TradeRegistry, WalletBalance,
};
use tokio::sync::watch;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "token-ladder")]
#[command(about = "Token screener with stop-loss and milestone exits", long_about = None)]
struct Args {
    /// Path to a TOML config file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Force the simulated venue regardless of the config
    #[arg(long)]
    paper: bool,

    /// Stop monitoring after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Screen and print the ranking without opening trades
    #[arg(long)]
    screen_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if args.paper {
        config.execution.mode = ExecutionMode::Paper;
    }
    config.validate().context("Invalid configuration")?;

    info!("Starting token-ladder ({:?} execution)", config.execution.mode);

    let request_timeout = Duration::from_secs(config.monitor.request_timeout_secs);
    let dexscreener = Arc::new(DexScreenerClient::new(config.provider.clone())?);

    // No holder or lock-status API is wired up yet: holder data is absent and
    // liquidity is assumed locked.
    let feed = AssembledFeed::new(
        dexscreener.clone(),
        Arc::new(StaticHolderSource::default()),
        Arc::new(StaticLockSource { locked: true }),
        Arc::new(StaticHistorySource::default()),
        request_timeout,
    );
    let screener = ScreenerBuilder::new()
        .with_config(config.scoring.clone())
        .build(Arc::new(feed));

    let report = screener.run().await?;
    for (rank, result) in report.results.iter().enumerate() {
        info!(
            "#{} {} score={:.2} liq=${:.0} vol=${:.0} tx={} top_holder={}%",
            rank + 1,
            result.address,
            result.score,
            result.liquidity_usd,
            result.volume_24h_usd,
            result.tx_count_24h,
            result.top_holder_pct
        );
    }

    if args.screen_only {
        return Ok(());
    }
    if report.results.is_empty() {
        warn!("No tokens passed screening");
    }

    let (venue, wallet): (Arc<dyn ExecutionVenue>, Arc<dyn WalletBalance>) = match config.execution.mode {
        ExecutionMode::Paper => {
            let paper = Arc::new(PaperVenue::new(
                dexscreener.clone(),
                config.execution.paper_starting_balance_usd,
                config.execution.paper_max_slippage_pct,
            ));
            let venue: Arc<dyn ExecutionVenue> = paper.clone();
            let wallet: Arc<dyn WalletBalance> = paper;
            (venue, wallet)
        }
        ExecutionMode::Http => {
            let http = Arc::new(HttpExecutionVenue::from_config(&config.execution, request_timeout)?);
            let venue: Arc<dyn ExecutionVenue> = http.clone();
            let wallet: Arc<dyn WalletBalance> = http;
            (venue, wallet)
        }
    };

    let registry = Arc::new(TradeRegistry::new());
    let onboarder = TradeOnboarder::new(
        registry.clone(),
        venue.clone(),
        wallet,
        config.trading.clone(),
        request_timeout,
    )?;

    // The monitor watches the registry while onboarding fills it
    let monitor = TradeMonitor::new(registry.clone(), dexscreener, venue, &config.monitor);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitor_handle = tokio::spawn(monitor.run(shutdown_rx, args.max_ticks));

    let onboarding = onboarder.open_positions(&report.results).await;
    info!("{} trades opened", onboarding.opened.len());

    tokio::select! {
        joined = &mut monitor_handle => {
            if let Err(e) = joined {
                error!("Monitor task failed: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Shutdown requested, finishing the current tick");
            let _ = shutdown_tx.send(true);
            if let Err(e) = monitor_handle.await {
                error!("Monitor task failed: {}", e);
            }
        }
    }

    info!("{} trades still open at exit", registry.len().await);
    Ok(())
}
