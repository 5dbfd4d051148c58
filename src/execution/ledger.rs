use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TradeSide;
use crate::risk::{ExitReason, ExitRules};

/// Broken ledger contract. These indicate an orchestration bug, not market conditions.
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("Already have an open position (entered @ {entry_price:.2})")]
    AlreadyOpen { entry_price: f64 },

    #[error("No open position to exit")]
    NoOpenPosition,

    #[error("Invalid order: price {price}, quantity {quantity}")]
    InvalidOrder { price: f64, quantity: f64 },
}

/// The single open position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: Uuid,
    pub quantity: f64,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

/// A committed simulated fill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fill {
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub equity_after: f64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of a position from entry to exit
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub position_id: Uuid,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub gross_pnl: f64,
    /// Entry and exit fees combined
    pub fees: f64,
    pub net_pnl: f64,
    pub held: Duration,
    pub reason: ExitReason,
}

/// Equity, the optional open position, and the time of the last trade
///
/// One ledger per instrument. Equity only moves on completed buys and sells.
#[derive(Debug, Clone)]
pub struct LedgerState {
    equity: f64,
    position: Option<Position>,
    /// Fee paid when the open position was entered
    entry_fee: f64,
    last_trade_at: Option<DateTime<Utc>>,
    fee_rt: f64,
    trades_closed: u32,
    realized_pnl: f64,
}

impl LedgerState {
    pub fn new(starting_equity: f64, fee_rt: f64) -> Self {
        Self {
            equity: starting_equity,
            position: None,
            entry_fee: 0.0,
            last_trade_at: None,
            fee_rt,
            trades_closed: 0,
            realized_pnl: 0.0,
        }
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn last_trade_at(&self) -> Option<DateTime<Utc>> {
        self.last_trade_at
    }

    /// Number of round trips completed this session
    pub fn trades_closed(&self) -> u32 {
        self.trades_closed
    }

    /// Net P&L of all closed round trips, fees included
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Open a position at the current time
    pub fn enter(&mut self, price: f64, quantity: f64) -> Result<Fill, LedgerError> {
        self.enter_at(price, quantity, Utc::now())
    }

    /// Open a position with explicit timestamp
    ///
    /// Debits `price * quantity` plus the fee on that cost.
    pub fn enter_at(
        &mut self,
        price: f64,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> Result<Fill, LedgerError> {
        if let Some(position) = &self.position {
            return Err(LedgerError::AlreadyOpen {
                entry_price: position.entry_price,
            });
        }
        if !(quantity > 0.0 && price > 0.0) || !quantity.is_finite() || !price.is_finite() {
            return Err(LedgerError::InvalidOrder { price, quantity });
        }

        let cost = price * quantity;
        let fee = cost * self.fee_rt;
        self.equity -= cost + fee;
        self.entry_fee = fee;
        self.position = Some(Position {
            id: Uuid::new_v4(),
            quantity,
            entry_price: price,
            opened_at: now,
        });
        self.last_trade_at = Some(now);

        Ok(Fill {
            side: TradeSide::Buy,
            price,
            quantity,
            fee,
            equity_after: self.equity,
            timestamp: now,
        })
    }

    /// Close the open position at the current time
    pub fn exit(&mut self, price: f64, reason: ExitReason) -> Result<(Fill, ClosedTrade), LedgerError> {
        self.exit_at(price, reason, Utc::now())
    }

    /// Close the open position with explicit timestamp
    ///
    /// Credits the proceeds minus the fee on those proceeds.
    pub fn exit_at(
        &mut self,
        price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<(Fill, ClosedTrade), LedgerError> {
        let position = self.position.take().ok_or(LedgerError::NoOpenPosition)?;

        let proceeds = price * position.quantity;
        let fee = proceeds * self.fee_rt;
        self.equity += proceeds - fee;
        self.last_trade_at = Some(now);

        let gross_pnl = (price - position.entry_price) * position.quantity;
        let fees = self.entry_fee + fee;
        let net_pnl = gross_pnl - fees;
        self.entry_fee = 0.0;
        self.trades_closed += 1;
        self.realized_pnl += net_pnl;

        let fill = Fill {
            side: TradeSide::Sell,
            price,
            quantity: position.quantity,
            fee,
            equity_after: self.equity,
            timestamp: now,
        };
        let trade = ClosedTrade {
            position_id: position.id,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            gross_pnl,
            fees,
            net_pnl,
            held: now - position.opened_at,
            reason,
        };

        Ok((fill, trade))
    }

    /// Check if the open position should exit (None when flat or holding)
    pub fn check_exit_at(
        &self,
        price: f64,
        now: DateTime<Utc>,
        rules: &ExitRules,
    ) -> Option<ExitReason> {
        let position = self.position.as_ref()?;
        rules.evaluate(position.entry_price, price, now - position.opened_at)
    }

    /// True while the last trade is more recent than `cooldown`
    ///
    /// Only gates new entries; exits of an open position are never blocked.
    pub fn in_cooldown_at(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_trade_at {
            Some(last) => now - last < cooldown,
            None => false,
        }
    }

    /// Mark-to-market equity: cash plus the open position at `price`
    pub fn marked_equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(position) => self.equity + price * position.quantity,
            None => self.equity,
        }
    }
}
