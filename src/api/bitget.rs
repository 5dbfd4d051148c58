use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{
    exchange_symbol, parse_kline_row, MarketDataSource, RateLimitedHttp, MAX_FETCH_LIMIT,
};
use crate::models::Candle;

const BITGET_API_BASE: &str = "https://api.bitget.com";
const RATE_LIMIT_RPS: u32 = 10;
const SUCCESS_CODE: &str = "00000";

/// Client for Bitget spot market data (public endpoints only)
#[derive(Clone)]
pub struct BitgetClient {
    http: RateLimitedHttp,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct BitgetResponse {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

impl BitgetClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: RateLimitedHttp::new("Bitget", RATE_LIMIT_RPS)?,
            base_url: BITGET_API_BASE.to_string(),
        })
    }

    /// Point the client at another host (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.http = self.http.with_retry_policy(max_retries, initial_backoff);
        self
    }

    /// Bitget v2 granularity codes
    pub fn granularity(timeframe: &str) -> Option<&'static str> {
        Some(match timeframe {
            "1m" => "1min",
            "5m" => "5min",
            "15m" => "15min",
            "30m" => "30min",
            "1h" => "1h",
            "4h" => "4h",
            "6h" => "6h",
            "12h" => "12h",
            "1d" => "1day",
            "1w" => "1week",
            _ => return None,
        })
    }

    /// Fetch candles from /api/v2/spot/market/candles, oldest first
    pub async fn get_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let granularity = Self::granularity(timeframe)
            .with_context(|| format!("Unsupported Bitget timeframe: {}", timeframe))?;

        let url = format!("{}/api/v2/spot/market/candles", self.base_url);
        let query = [
            ("symbol", exchange_symbol(symbol)),
            ("granularity", granularity.to_string()),
            ("limit", limit.min(MAX_FETCH_LIMIT).to_string()),
        ];

        let response = self.http.get(&url, &query).await?;
        let body: BitgetResponse = response
            .json()
            .await
            .context("Failed to parse Bitget candles")?;

        if body.code != SUCCESS_CODE {
            anyhow::bail!("Bitget API error {}: {}", body.code, body.msg);
        }

        let mut candles = body
            .data
            .iter()
            .map(|row| parse_kline_row(row).context("Malformed Bitget candle row"))
            .collect::<Result<Vec<_>>>()?;
        candles.sort_by_key(|c| c.timestamp);

        Ok(candles)
    }
}

#[async_trait]
impl MarketDataSource for BitgetClient {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        self.get_candles(symbol, timeframe, limit).await
    }

    fn name(&self) -> &str {
        "bitget"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> BitgetClient {
        BitgetClient::new()
            .unwrap()
            .with_base_url(server.url())
            .with_retry_policy(2, Duration::ZERO)
    }

    #[test]
    fn test_granularity_mapping() {
        assert_eq!(BitgetClient::granularity("1m"), Some("1min"));
        assert_eq!(BitgetClient::granularity("1d"), Some("1day"));
        assert_eq!(BitgetClient::granularity("3m"), None);
    }

    #[tokio::test]
    async fn test_get_candles() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v2/spot/market/candles")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("granularity".into(), "5min".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"code":"00000","msg":"success","requestTime":1700000400000,"data":[
                    ["1700000300000","2001","2003","2000","2002","1.5","3003","3003"],
                    ["1700000000000","2000","2002","1999","2001","2.5","5002.5","5002.5"]
                ]}"#,
            )
            .create_async()
            .await;

        let candles = client(&server).get_candles("ETH/USDT", "5m", 100).await.unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 2001.0);
        assert_eq!(candles[0].volume, 2.5);
        assert_eq!(candles[1].close, 2002.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v2/spot/market/candles")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":"40034","msg":"Parameter symbol does not exist","data":[]}"#)
            .create_async()
            .await;

        let err = client(&server).get_candles("NOPE/USDT", "1m", 10).await.unwrap_err();
        assert!(err.to_string().contains("40034"));
    }
}
