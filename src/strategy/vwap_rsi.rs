use crate::indicators::IndicatorFrame;
use crate::models::{Candle, Signal};
use crate::strategy::signals::{evaluate_entry, EntrySignal, SignalConfig};
use crate::strategy::Strategy;
use crate::Result;

/// Extra candles required beyond the VWAP window before trading
pub const WARMUP_MARGIN: usize = 5;

/// Long-only VWAP discount scalper
///
/// Entry conditions (ALL must be true):
/// - Price trades at least `dd_min` below the rolling VWAP
/// - RSI is at or below the oversold level
///
/// Exits are not signalled here; the position ledger owns take-profit,
/// stop-loss and max-hold rules.
#[derive(Debug, Clone)]
pub struct VwapRsiStrategy {
    pub rsi_length: usize,
    pub vwap_window: usize,
    pub signals: SignalConfig,
}

impl Default for VwapRsiStrategy {
    fn default() -> Self {
        Self {
            rsi_length: 7,
            vwap_window: 60,
            signals: SignalConfig::default(),
        }
    }
}

impl VwapRsiStrategy {
    pub fn new(rsi_length: usize, vwap_window: usize, signals: SignalConfig) -> Self {
        Self {
            rsi_length,
            vwap_window,
            signals,
        }
    }

    /// Evaluate the entry rule at the newest candle
    ///
    /// Returns None while the indicators have no value (warm-up or zero volume).
    pub fn evaluate(&self, candles: &[Candle]) -> Option<EntrySignal> {
        let price = candles.last()?.close;
        let snapshot = IndicatorFrame::compute(candles, self.rsi_length, self.vwap_window).latest();
        evaluate_entry(price, snapshot.rsi?, snapshot.vwap?, &self.signals)
    }
}

impl Strategy for VwapRsiStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> Result<Signal> {
        if candles.len() < self.min_candles_required() {
            return Err(format!(
                "Need at least {} candles for VWAP/RSI strategy, got {}",
                self.min_candles_required(),
                candles.len()
            )
            .into());
        }

        match self.evaluate(candles) {
            Some(signal) if signal.should_long => Ok(Signal::Buy),
            _ => Ok(Signal::Hold),
        }
    }

    fn name(&self) -> &str {
        "VWAP/RSI Scalper"
    }

    fn min_candles_required(&self) -> usize {
        self.vwap_window + WARMUP_MARGIN
    }
}
