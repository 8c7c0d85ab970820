//! Tapescope - headless market microstructure scanner
//!
//! Sweeps the configured symbols on an interval, prints each cycle's
//! assessments as JSON lines to stdout, and logs signal alerts subject to
//! the per-symbol cooldown.
//!
//! # Usage
//! ```sh
//! SYMBOLS=BTCUSDT,ETHUSDT cargo run -- --interval-secs 60
//! ```
//!
//! # Environment Variables
//! - `SYMBOLS` - comma-separated symbol list (default: BTCUSDT,ETHUSDT)
//! - `SWEEP_INTERVAL_SECS` - pause between cycles (default: 60)
//! - `MAX_CONCURRENCY` - concurrent symbol analyses (default: 4)
//! - `ALERT_COOLDOWN_SECS` - minimum gap between alerts per symbol (default: 900)
//! - `ANALYSIS_CONFIG` - optional TOML file overriding detector parameters

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tapescope::application::analysis::SymbolAnalyzer;
use tapescope::application::scanner::{MarketSweep, SweepConfig};
use tapescope::config::Config;
use tapescope::infrastructure::mock::MockMarketDataService;
use tapescope::infrastructure::stores::InMemoryCooldownStore;
use tokio::sync::watch;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "tapescope", about = "Market microstructure scanner")]
struct Args {
    /// Comma-separated symbols, overriding SYMBOLS.
    #[arg(long)]
    symbols: Option<String>,

    /// Seconds between sweep cycles, overriding SWEEP_INTERVAL_SECS.
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Run a single sweep cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(symbols) = args.symbols {
        config.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(secs) = args.interval_secs {
        config.sweep_interval = std::time::Duration::from_secs(secs);
    }

    info!("Tapescope {} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Sweeping {} symbols every {:?} with {} workers",
        config.symbols.len(),
        config.sweep_interval,
        config.max_concurrency
    );

    let sweep = MarketSweep::new(
        Arc::new(MockMarketDataService::new()),
        Arc::new(InMemoryCooldownStore::new(config.alert_cooldown)),
        Arc::new(SymbolAnalyzer::new(config.analysis.clone())),
        SweepConfig {
            symbols: config.symbols.clone(),
            max_concurrency: config.max_concurrency,
            candle_limit: config.candle_limit,
            trade_limit: config.trade_limit,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current work");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut interval = tokio::time::interval(config.sweep_interval);
    loop {
        interval.tick().await;
        let assessments = sweep.run_cycle(&shutdown_rx).await?;
        for assessment in &assessments {
            println!("{}", serde_json::to_string(assessment)?);
        }
        info!(cycle_size = assessments.len(), "sweep cycle complete");

        if args.once || *shutdown_rx.borrow() {
            break;
        }
    }

    info!("Tapescope stopped.");
    Ok(())
}
