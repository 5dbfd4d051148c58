use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::api::MexcClient;
use crate::execution::ledger::Fill;
use crate::models::TradeSide;

/// Order derived from a committed ledger fill
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    /// Price the ledger booked the fill at
    pub price: f64,
}

impl OrderRequest {
    pub fn from_fill(symbol: &str, fill: &Fill) -> Self {
        Self {
            symbol: symbol.to_string(),
            side: fill.side,
            quantity: fill.quantity,
            price: fill.price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: String,
    /// True when no real order was sent
    pub simulated: bool,
}

/// Where orders go after the ledger has committed them
///
/// A failure here does not undo the ledger fill; the caller reports it.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation>;

    fn name(&self) -> &str;
}

/// Paper mode: the ledger mutation is the execution
#[derive(Debug, Clone, Default)]
pub struct PaperSink;

#[async_trait]
impl ExecutionSink for PaperSink {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        tracing::debug!(
            side = %order.side,
            quantity = order.quantity,
            price = order.price,
            "Paper order filled"
        );

        Ok(OrderConfirmation {
            order_id: format!("paper-{}", Uuid::new_v4()),
            simulated: true,
        })
    }

    fn name(&self) -> &str {
        "paper"
    }
}

/// Live mode: market orders on MEXC spot
#[derive(Clone)]
pub struct MexcOrderSink {
    client: MexcClient,
}

impl MexcOrderSink {
    pub fn new(client: MexcClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutionSink for MexcOrderSink {
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation> {
        if order.quantity <= 0.0 {
            anyhow::bail!("Refusing to send order with quantity {}", order.quantity);
        }

        let response = self
            .client
            .place_market_order(&order.symbol, order.side, order.quantity)
            .await?;

        tracing::info!(
            order_id = %response.order_id,
            symbol = %response.symbol,
            "MEXC order accepted"
        );

        Ok(OrderConfirmation {
            order_id: response.order_id,
            simulated: false,
        })
    }

    fn name(&self) -> &str {
        "mexc-live"
    }
}
