use chrono::Duration;

/// Fixed cost buffer added on top of fees and slippage
pub const DEFAULT_GUARD_BUFFER: f64 = 0.0004;
/// Margin a take-profit must clear above the round-trip guard
pub const TAKE_PROFIT_EPSILON: f64 = 0.0002;

/// Why an open position should be closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeStop,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::TimeStop => write!(f, "max-hold"),
        }
    }
}

/// Exit thresholds for an open position
#[derive(Debug, Clone)]
pub struct ExitRules {
    /// Fee charged per leg, as a fraction of notional
    pub fee_rt: f64,
    pub slippage_rt: f64,
    pub guard_buffer: f64,
    pub tp_offset: f64,
    pub sl_offset: f64,
    pub max_hold: Duration,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            fee_rt: 0.0010,
            slippage_rt: 0.0006,
            guard_buffer: DEFAULT_GUARD_BUFFER,
            tp_offset: 0.0040,
            sl_offset: 0.0060,
            max_hold: Duration::seconds(1500),
        }
    }
}

impl ExitRules {
    /// Minimum round-trip cost a profitable exit must clear
    pub fn guard(&self) -> f64 {
        self.fee_rt + self.slippage_rt + self.guard_buffer
    }

    /// Take-profit return actually used; never below break-even plus buffer
    pub fn net_take_profit(&self) -> f64 {
        self.tp_offset.max(self.guard() + TAKE_PROFIT_EPSILON)
    }

    /// First matching exit reason, in priority order take-profit, stop-loss, max-hold
    pub fn evaluate(&self, entry_price: f64, price: f64, age: Duration) -> Option<ExitReason> {
        let ret = (price - entry_price) / entry_price;

        if ret >= self.net_take_profit() {
            return Some(ExitReason::TakeProfit);
        }

        if ret <= -self.sl_offset {
            return Some(ExitReason::StopLoss);
        }

        if age >= self.max_hold {
            return Some(ExitReason::TimeStop);
        }

        None
    }
}
