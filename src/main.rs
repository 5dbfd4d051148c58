use anyhow::{Context, Result};
use clap::Parser;
use scalper::api::{BitgetClient, MarketDataSource, MexcClient, SyntheticSource};
use scalper::config::{Exchange, ScalperConfig};
use scalper::execution::{
    Engine, ExecutionSink, LedgerState, MexcOrderSink, PaperSink, Runner, RunnerSettings,
};
use tracing_subscriber::EnvFilter;

const SYNTHETIC_BASE_PRICE: f64 = 100.0;

#[derive(Parser, Debug)]
#[command(name = "scalper")]
#[command(about = "VWAP/RSI mean-reversion scalper (paper trading by default)", long_about = None)]
struct Args {
    /// Send real orders (overrides PAPER_MODE)
    #[arg(long, conflicts_with = "synthetic")]
    live: bool,

    /// Use the offline synthetic feed instead of the exchange
    #[arg(long)]
    synthetic: bool,

    /// Seed for the synthetic feed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();

    let mut config = ScalperConfig::from_env()?;
    if args.live {
        config.paper_mode = false;
    }
    config.validate_for(args.synthetic)?;

    tracing::info!("🚀 Scalper starting");
    log_configuration(&config, &args);

    let source = create_source(&config, &args)?;
    let sink = create_sink(&config)?;

    let engine = Engine::new(
        config.engine_config(),
        LedgerState::new(config.start_equity, config.fee_rt),
    );
    let settings = RunnerSettings {
        symbol: config.symbol.clone(),
        timeframe: config.timeframe.clone(),
        lookback: config.lookback,
        poll_interval: config.poll_interval(),
        error_backoff: config.error_backoff(),
        max_ticks: args.max_ticks,
    };

    let mut runner = Runner::new(engine, source, sink, settings);

    tracing::info!("\nPress Ctrl+C to stop...\n");
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = runner.run(shutdown).await;

    let summary = runner.summary();
    let ledger = runner.engine().ledger();
    tracing::info!("\n📊 Session summary:");
    tracing::info!("  Ticks: {} ({} fetch errors)", summary.ticks, summary.fetch_errors);
    tracing::info!("  Entries: {} | Exits: {}", summary.entries, summary.exits);
    tracing::info!("  Trades closed: {}", ledger.trades_closed());
    tracing::info!("  Realized PnL: {:+.4}", ledger.realized_pnl());
    tracing::info!(
        "  Equity: {:.2} (start {:.2})",
        ledger.equity(),
        config.start_equity
    );
    if let Some(position) = ledger.position() {
        tracing::warn!(
            "  Position still open: {:.6} @ {:.2}",
            position.quantity,
            position.entry_price
        );
    }
    if summary.order_failures > 0 {
        tracing::warn!("  Order failures: {}", summary.order_failures);
    }

    result.context("Engine stopped on a ledger error")?;

    tracing::info!("👋 Scalper stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scalper=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(config: &ScalperConfig, args: &Args) {
    let exits = config.engine_config().exits;

    tracing::info!("\n📊 Configuration:");
    tracing::info!(
        "  Mode: {}",
        if config.paper_mode { "PAPER" } else { "LIVE" }
    );
    tracing::info!(
        "  Source: {}",
        if args.synthetic {
            format!("synthetic (seed {})", args.seed)
        } else {
            config.exchange.to_string()
        }
    );
    tracing::info!("  Symbol: {} ({})", config.symbol, config.timeframe);
    tracing::info!("  Start equity: {:.2}", config.start_equity);
    tracing::info!(
        "  VWAP window: {} | RSI length: {} | min drawdown: {:.2}%",
        config.vwap_win,
        config.rsi_len,
        config.dd_min * 100.0
    );
    tracing::info!(
        "  TP: {:.2}% (net {:.2}%) | SL: {:.2}% | max hold: {}s",
        config.tp_offset * 100.0,
        exits.net_take_profit() * 100.0,
        config.sl_offset * 100.0,
        config.max_hold_sec
    );
    tracing::info!(
        "  Risk per trade: {:.1}% | cooldown: {}s",
        config.risk_per_trade * 100.0,
        config.cooldown_sec
    );
    tracing::debug!(?config, "Effective configuration");
}

fn create_source(config: &ScalperConfig, args: &Args) -> Result<Box<dyn MarketDataSource>> {
    if args.synthetic {
        return Ok(Box::new(SyntheticSource::new(args.seed, SYNTHETIC_BASE_PRICE)));
    }

    Ok(match config.exchange {
        Exchange::Mexc => Box::new(MexcClient::new().context("Failed to create MEXC client")?),
        Exchange::Bitget => {
            Box::new(BitgetClient::new().context("Failed to create Bitget client")?)
        }
    })
}

fn create_sink(config: &ScalperConfig) -> Result<Box<dyn ExecutionSink>> {
    if config.paper_mode {
        return Ok(Box::new(PaperSink));
    }

    tracing::warn!("⚠️  LIVE mode: real orders will be sent to {}", config.exchange);
    let client = MexcClient::new()
        .context("Failed to create MEXC client")?
        .with_credentials(config.api_key.clone(), config.api_secret.clone());

    Ok(Box::new(MexcOrderSink::new(client)))
}
