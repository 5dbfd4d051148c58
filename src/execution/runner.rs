use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::api::MarketDataSource;
use crate::execution::engine::{Engine, EngineEvent, SkipReason, TickError, TickReport};
use crate::execution::executor::{ExecutionSink, OrderRequest};

#[derive(Debug, Error)]
pub enum StepError {
    /// Transient: the tick is skipped and retried after a backoff
    #[error("Candle fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    /// Fatal: the ledger contract was broken
    #[error(transparent)]
    Engine(#[from] TickError),
}

/// Polling settings for the runner
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub symbol: String,
    pub timeframe: String,
    pub lookback: usize,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    /// Stop after this many ticks (None = run until shutdown)
    pub max_ticks: Option<u64>,
}

/// Session counters reported on shutdown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub fetch_errors: u64,
    pub entries: u64,
    pub exits: u64,
    pub order_failures: u64,
    pub final_equity: f64,
    pub realized_pnl: f64,
}

/// Drives the engine: fetch candles, tick, forward fills to the sink
pub struct Runner {
    engine: Engine,
    source: Box<dyn MarketDataSource>,
    sink: Box<dyn ExecutionSink>,
    settings: RunnerSettings,
    summary: RunSummary,
}

impl Runner {
    pub fn new(
        engine: Engine,
        source: Box<dyn MarketDataSource>,
        sink: Box<dyn ExecutionSink>,
        settings: RunnerSettings,
    ) -> Self {
        let final_equity = engine.ledger().equity();
        Self {
            engine,
            source,
            sink,
            settings,
            summary: RunSummary {
                final_equity,
                ..Default::default()
            },
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// One full tick: fetch, evaluate, then send committed fills to the sink
    pub async fn step(&mut self) -> Result<TickReport, StepError> {
        let candles = self
            .source
            .fetch_candles(&self.settings.symbol, &self.settings.timeframe, self.settings.lookback)
            .await
            .map_err(StepError::Fetch)?;

        let report = self.engine.tick(&candles, Utc::now())?;
        self.summary.ticks += 1;

        log_report(&report, &fill_tag(self.sink.name()));

        for fill in report.fills() {
            let order = OrderRequest::from_fill(&self.settings.symbol, fill);
            match self.sink.place_order(&order).await {
                Ok(confirmation) => {
                    tracing::debug!(
                        sink = self.sink.name(),
                        order_id = %confirmation.order_id,
                        "Order confirmed"
                    );
                }
                Err(e) => {
                    // Ledger already booked the fill; bookkeeping and execution can diverge
                    self.summary.order_failures += 1;
                    tracing::error!(
                        "❌ {} order for {:.6} @ {:.2} failed on {}: {:#}",
                        order.side,
                        order.quantity,
                        order.price,
                        self.sink.name(),
                        e
                    );
                }
            }
        }

        for event in &report.events {
            match event {
                EngineEvent::EntryExecuted(_) => self.summary.entries += 1,
                EngineEvent::ExitExecuted { .. } => self.summary.exits += 1,
                EngineEvent::SignalDetected(_) => {}
            }
        }
        self.summary.final_equity = self.engine.ledger().equity();
        self.summary.realized_pnl = self.engine.ledger().realized_pnl();

        Ok(report)
    }

    /// Tick until `shutdown` resolves, the tick limit is reached, or the engine fails
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunSummary, TickError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            if let Some(max) = self.settings.max_ticks {
                if self.summary.ticks >= max {
                    tracing::info!("Reached tick limit ({})", max);
                    break;
                }
            }

            let delay = match self.step().await {
                Ok(_) => self.settings.poll_interval,
                Err(StepError::Fetch(e)) => {
                    self.summary.fetch_errors += 1;
                    tracing::warn!(
                        "Candle fetch from {} failed: {:#}. Retrying in {:?}",
                        self.source.name(),
                        e,
                        self.settings.error_backoff
                    );
                    self.settings.error_backoff
                }
                Err(StepError::Engine(e)) => {
                    tracing::error!("Engine stopped: {}", e);
                    return Err(e);
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(self.summary.clone())
    }
}

/// Log prefix for fills, e.g. "[PAPER]" or "[MEXC-LIVE]"
fn fill_tag(sink_name: &str) -> String {
    format!("[{}]", sink_name.to_uppercase())
}

/// Render engine events as log lines
fn log_report(report: &TickReport, tag: &str) {
    for event in &report.events {
        match event {
            EngineEvent::EntryExecuted(fill) => {
                tracing::info!(
                    "🟢 {} BUY {:.6} @ {:.2} | equity {:.2}",
                    tag,
                    fill.quantity,
                    fill.price,
                    fill.equity_after
                );
            }
            EngineEvent::ExitExecuted { fill, trade } => {
                tracing::info!(
                    "🔴 {} SELL {:.6} @ {:.2} ({}) | net {:+.4} after {}s | equity {:.2}",
                    tag,
                    fill.quantity,
                    fill.price,
                    trade.reason,
                    trade.net_pnl,
                    trade.held.num_seconds(),
                    fill.equity_after
                );
            }
            EngineEvent::SignalDetected(signal) => {
                tracing::info!(
                    "📈 [SIGNAL] LONG | dd={:.2}% rsi={:.1}",
                    signal.deviation * 100.0,
                    signal.rsi
                );
            }
        }
    }

    match report.skipped {
        Some(SkipReason::InsufficientData { have, need }) => {
            tracing::debug!(have, need, "Waiting for enough candles");
        }
        Some(SkipReason::Cooldown { remaining }) => {
            tracing::debug!(remaining_secs = remaining.num_seconds(), "Cooling down");
        }
        Some(SkipReason::ZeroQuantity) => {
            tracing::warn!("Signal ignored: sizer returned zero quantity");
        }
        Some(SkipReason::IndicatorsUnavailable) => {
            tracing::debug!("Indicators unavailable for latest candle");
        }
        Some(SkipReason::PositionOpen) | Some(SkipReason::ExitedThisTick) | None => {
            if let (Some(price), Some(signal)) = (report.price, report.signal) {
                tracing::debug!(
                    price,
                    dd_pct = signal.deviation * 100.0,
                    rsi = signal.rsi,
                    "Tick evaluated"
                );
            }
        }
    }
}
