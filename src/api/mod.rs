pub mod bitget;
pub mod http;
pub mod mexc;
pub mod synthetic;

pub use bitget::BitgetClient;
pub use http::RateLimitedHttp;
pub use mexc::MexcClient;
pub use synthetic::SyntheticSource;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::Candle;

/// Most candles a single kline request returns on the supported exchanges
pub const MAX_FETCH_LIMIT: usize = 1000;

/// Source of OHLCV candles for one symbol
///
/// Implementations return candles sorted oldest to newest. Errors are
/// transient I/O failures; the caller decides whether to retry.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, timeframe: &str, limit: usize)
        -> Result<Vec<Candle>>;

    fn name(&self) -> &str;
}

/// "BTC/USDT" -> "BTCUSDT"
pub fn exchange_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Length of a timeframe such as "1m", "15m", "1h", "1d" in seconds
pub fn timeframe_seconds(timeframe: &str) -> Option<i64> {
    let timeframe = timeframe.trim();
    let split = timeframe.find(|c: char| !c.is_ascii_digit())?;
    let (count, unit) = timeframe.split_at(split);
    let count: i64 = count.parse().ok()?;
    if count <= 0 {
        return None;
    }

    let unit_secs = match unit {
        "m" | "min" => 60,
        "h" => 3600,
        "d" | "day" => 86_400,
        "w" | "week" => 604_800,
        _ => return None,
    };

    Some(count * unit_secs)
}

/// Exchange payloads carry numbers either as JSON numbers or strings
pub(crate) fn parse_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn parse_millis(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse a kline row laid out as `[time_ms, open, high, low, close, volume, ...]`
pub(crate) fn parse_kline_row(row: &serde_json::Value) -> Option<Candle> {
    let fields = row.as_array()?;
    if fields.len() < 6 {
        return None;
    }

    Some(Candle {
        timestamp: parse_millis(&fields[0])?,
        open: parse_number(&fields[1])?,
        high: parse_number(&fields[2])?,
        low: parse_number(&fields[3])?,
        close: parse_number(&fields[4])?,
        volume: parse_number(&fields[5])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exchange_symbol() {
        assert_eq!(exchange_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(exchange_symbol("eth-usdt"), "ETHUSDT");
        assert_eq!(exchange_symbol("SOLUSDT"), "SOLUSDT");
    }

    #[test]
    fn test_timeframe_seconds() {
        assert_eq!(timeframe_seconds("1m"), Some(60));
        assert_eq!(timeframe_seconds("15m"), Some(900));
        assert_eq!(timeframe_seconds("4h"), Some(14_400));
        assert_eq!(timeframe_seconds("1d"), Some(86_400));
        assert_eq!(timeframe_seconds("m"), None);
        assert_eq!(timeframe_seconds("0m"), None);
        assert_eq!(timeframe_seconds("5x"), None);
    }

    #[test]
    fn test_parse_kline_row_mixed_types() {
        let row = json!([1700000000000i64, "100.5", "101", 99.5, "100.25", "12.5", 1700000059999i64]);
        let candle = parse_kline_row(&row).unwrap();

        assert_eq!(candle.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(candle.open, 100.5);
        assert_eq!(candle.high, 101.0);
        assert_eq!(candle.low, 99.5);
        assert_eq!(candle.close, 100.25);
        assert_eq!(candle.volume, 12.5);
    }

    #[test]
    fn test_parse_kline_row_rejects_short_or_bad_rows() {
        assert!(parse_kline_row(&json!([1700000000000i64, "1", "2"])).is_none());
        assert!(parse_kline_row(&json!([1700000000000i64, "x", "1", "1", "1", "1"])).is_none());
        assert!(parse_kline_row(&json!({"open": 1})).is_none());
    }
}
