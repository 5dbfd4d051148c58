use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use super::{
    exchange_symbol, parse_kline_row, MarketDataSource, RateLimitedHttp, MAX_FETCH_LIMIT,
};
use crate::models::{Candle, TradeSide};

const MEXC_API_BASE: &str = "https://api.mexc.com";
const RATE_LIMIT_RPS: u32 = 10;
const RECV_WINDOW_MS: u64 = 5000;

type HmacSha256 = Hmac<Sha256>;

/// Client for the MEXC spot REST API
///
/// Public klines need no credentials; order placement requires an API key and secret.
#[derive(Clone)]
pub struct MexcClient {
    http: RateLimitedHttp,
    base_url: String,
    credentials: Option<(String, String)>,
}

/// Response from POST /api/v3/order
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MexcOrderResponse {
    pub order_id: String,
    pub symbol: String,
    #[serde(default)]
    pub transact_time: Option<i64>,
}

impl MexcClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: RateLimitedHttp::new("MEXC", RATE_LIMIT_RPS)?,
            base_url: MEXC_API_BASE.to_string(),
            credentials: None,
        })
    }

    /// Point the client at another host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_credentials(mut self, api_key: String, api_secret: String) -> Self {
        self.credentials = Some((api_key, api_secret));
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.http = self.http.with_retry_policy(max_retries, initial_backoff);
        self
    }

    /// MEXC interval codes ("1h" is spelled "60m")
    pub fn interval(timeframe: &str) -> Option<&'static str> {
        Some(match timeframe {
            "1m" => "1m",
            "5m" => "5m",
            "15m" => "15m",
            "30m" => "30m",
            "1h" | "60m" => "60m",
            "4h" => "4h",
            "1d" => "1d",
            "1w" | "1W" => "1W",
            "1M" => "1M",
            _ => return None,
        })
    }

    /// Fetch klines from /api/v3/klines, oldest first
    pub async fn get_klines(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let interval = Self::interval(timeframe)
            .with_context(|| format!("Unsupported MEXC timeframe: {}", timeframe))?;

        let url = format!("{}/api/v3/klines", self.base_url);
        let query = [
            ("symbol", exchange_symbol(symbol)),
            ("interval", interval.to_string()),
            ("limit", limit.min(MAX_FETCH_LIMIT).to_string()),
        ];

        let response = self.http.get(&url, &query).await?;
        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .context("Failed to parse MEXC klines")?;

        let mut candles = rows
            .iter()
            .map(|row| parse_kline_row(row).context("Malformed MEXC kline row"))
            .collect::<Result<Vec<_>>>()?;
        candles.sort_by_key(|c| c.timestamp);

        Ok(candles)
    }

    /// Place a signed spot MARKET order
    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: f64,
    ) -> Result<MexcOrderResponse> {
        let (api_key, api_secret) = self
            .credentials
            .as_ref()
            .context("MEXC credentials are required to place orders")?;

        let side = match side {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        };
        let query = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&recvWindow={}&timestamp={}",
            exchange_symbol(symbol),
            side,
            format_quantity(quantity),
            RECV_WINDOW_MS,
            Utc::now().timestamp_millis()
        );
        let signature = sign(api_secret, &query)?;
        let url = format!(
            "{}/api/v3/order?{}&signature={}",
            self.base_url, query, signature
        );

        // Orders are not idempotent: rate limit, but never retry
        self.http.throttle().await;
        let response = self
            .http
            .client()
            .post(&url)
            .header("X-MEXC-APIKEY", api_key)
            .header("Content-Type", "application/json")
            .send()
            .await
            .context("MEXC order request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("MEXC rejected order ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse MEXC order response")
    }
}

#[async_trait]
impl MarketDataSource for MexcClient {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, limit).await
    }

    fn name(&self) -> &str {
        "mexc"
    }
}

/// Hex HMAC-SHA256 of the query string
fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid MEXC secret: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Up to 8 decimals without trailing zeros
fn format_quantity(quantity: f64) -> String {
    let formatted = format!("{:.8}", quantity);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
