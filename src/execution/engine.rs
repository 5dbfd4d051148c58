use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::execution::ledger::{ClosedTrade, Fill, LedgerError, LedgerState};
use crate::indicators::{IndicatorFrame, IndicatorSnapshot};
use crate::models::Candle;
use crate::risk::{ExitRules, PositionSizer};
use crate::strategy::signals::{evaluate_entry, EntrySignal, SignalConfig};
use crate::strategy::vwap_rsi::WARMUP_MARGIN;

#[derive(Debug, Error, PartialEq)]
pub enum TickError {
    #[error("Ledger contract violated: {0}")]
    Ledger(#[from] LedgerError),
}

/// Everything the engine needs besides market data
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rsi_length: usize,
    pub vwap_window: usize,
    pub signals: SignalConfig,
    pub sizer: PositionSizer,
    pub exits: ExitRules,
    pub cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rsi_length: 7,
            vwap_window: 60,
            signals: SignalConfig::default(),
            sizer: PositionSizer::default(),
            exits: ExitRules::default(),
            cooldown: Duration::seconds(60),
        }
    }
}

impl EngineConfig {
    /// Candles required before any evaluation happens
    pub fn min_candles(&self) -> usize {
        self.vwap_window + WARMUP_MARGIN
    }
}

/// Discrete events for the observability layer
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    SignalDetected(EntrySignal),
    EntryExecuted(Fill),
    ExitExecuted { fill: Fill, trade: ClosedTrade },
}

/// Why a tick ended without considering a new entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Fewer candles than the warm-up requirement
    InsufficientData { have: usize, need: usize },
    Cooldown { remaining: Duration },
    /// A position is still open after the exit check
    PositionOpen,
    /// The position was closed earlier in this tick
    ExitedThisTick,
    /// RSI or VWAP has no value at the newest candle
    IndicatorsUnavailable,
    /// Signal fired but the sizer returned zero
    ZeroQuantity,
}

/// Result of one engine pass over a candle series
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub price: Option<f64>,
    pub indicators: Option<IndicatorSnapshot>,
    pub signal: Option<EntrySignal>,
    pub skipped: Option<SkipReason>,
    pub events: Vec<EngineEvent>,
}

impl TickReport {
    fn skipped(price: Option<f64>, indicators: Option<IndicatorSnapshot>, reason: SkipReason) -> Self {
        Self {
            price,
            indicators,
            signal: None,
            skipped: Some(reason),
            events: Vec::new(),
        }
    }

    /// Fills committed during this tick, in order
    pub fn fills(&self) -> impl Iterator<Item = &Fill> {
        self.events.iter().filter_map(|event| match event {
            EngineEvent::EntryExecuted(fill) => Some(fill),
            EngineEvent::ExitExecuted { fill, .. } => Some(fill),
            EngineEvent::SignalDetected(_) => None,
        })
    }
}

/// Signal-and-position engine for one instrument
///
/// Owns the ledger. Each tick runs: indicators, exit check, cooldown,
/// entry check. Nothing in here blocks or performs I/O.
pub struct Engine {
    config: EngineConfig,
    ledger: LedgerState,
}

impl Engine {
    pub fn new(config: EngineConfig, ledger: LedgerState) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    /// Evaluate one candle snapshot at `now`
    ///
    /// Books at most one ledger mutation: a tick that exits never re-enters,
    /// even with a zero cooldown.
    pub fn tick(&mut self, candles: &[Candle], now: DateTime<Utc>) -> Result<TickReport, TickError> {
        let need = self.config.min_candles();
        let Some(latest) = candles.last().filter(|_| candles.len() >= need) else {
            return Ok(TickReport::skipped(
                None,
                None,
                SkipReason::InsufficientData {
                    have: candles.len(),
                    need,
                },
            ));
        };
        let price = latest.close;

        let indicators =
            IndicatorFrame::compute(candles, self.config.rsi_length, self.config.vwap_window)
                .latest();

        let mut events = Vec::new();

        // Exit check always precedes any entry logic
        let exited = match self.ledger.check_exit_at(price, now, &self.config.exits) {
            Some(reason) => {
                let (fill, trade) = self.ledger.exit_at(price, reason, now)?;
                events.push(EngineEvent::ExitExecuted { fill, trade });
                true
            }
            None => false,
        };

        let mut report = TickReport {
            price: Some(price),
            indicators: Some(indicators),
            signal: None,
            skipped: None,
            events,
        };

        if self.ledger.in_cooldown_at(now, self.config.cooldown) {
            let remaining = self
                .ledger
                .last_trade_at()
                .map(|last| self.config.cooldown - (now - last))
                .unwrap_or_else(Duration::zero);
            report.skipped = Some(SkipReason::Cooldown { remaining });
            return Ok(report);
        }

        let (Some(rsi), Some(vwap)) = (indicators.rsi, indicators.vwap) else {
            report.skipped = Some(SkipReason::IndicatorsUnavailable);
            return Ok(report);
        };

        let Some(signal) = evaluate_entry(price, rsi, vwap, &self.config.signals) else {
            report.skipped = Some(SkipReason::IndicatorsUnavailable);
            return Ok(report);
        };
        report.signal = Some(signal);

        if !self.ledger.is_flat() {
            report.skipped = Some(SkipReason::PositionOpen);
            return Ok(report);
        }

        if exited {
            report.skipped = Some(SkipReason::ExitedThisTick);
            return Ok(report);
        }

        if !signal.should_long {
            return Ok(report);
        }

        let quantity = self.config.sizer.quantity(price, self.ledger.equity());
        if quantity <= 0.0 {
            report.skipped = Some(SkipReason::ZeroQuantity);
            return Ok(report);
        }

        let fill = self.ledger.enter_at(price, quantity, now)?;
        report.events.push(EngineEvent::EntryExecuted(fill));
        report.events.push(EngineEvent::SignalDetected(signal));

        Ok(report)
    }
}
