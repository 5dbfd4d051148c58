use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{timeframe_seconds, MarketDataSource};
use crate::models::Candle;

/// Probability per candle of a sharp sell-off
const FLUSH_PROBABILITY: f64 = 0.03;

/// Offline market feed for dry runs
///
/// Sideways mean-reverting random walk with occasional sharp sell-offs on
/// high volume. The first fetch back-fills `limit` candles; every later
/// fetch appends one new candle, like a live exchange between polls.
pub struct SyntheticSource {
    state: Mutex<SyntheticState>,
    base_price: f64,
    base_volume: f64,
}

struct SyntheticState {
    rng: StdRng,
    candles: VecDeque<Candle>,
    price: f64,
}

impl SyntheticSource {
    /// Create a source with a seed for reproducibility
    pub fn new(seed: u64, base_price: f64) -> Self {
        Self {
            state: Mutex::new(SyntheticState {
                rng: StdRng::seed_from_u64(seed),
                candles: VecDeque::new(),
                price: base_price,
            }),
            base_price,
            base_volume: 10.0,
        }
    }

    fn next_candle(&self, state: &mut SyntheticState, timestamp: DateTime<Utc>) -> Candle {
        let open = state.price;

        let (change, volume_multiplier) = if state.rng.gen_bool(FLUSH_PROBABILITY) {
            // Panic candle: -0.5% to -1.2% on 2-4x volume
            (-state.rng.gen_range(0.005..0.012), state.rng.gen_range(2.0..4.0))
        } else {
            let reversion = (self.base_price - open) / self.base_price * 0.05;
            let noise = state.rng.gen_range(-0.0015..0.0015); // ±0.15% noise
            (reversion + noise, state.rng.gen_range(0.5..1.5))
        };

        let close = (open * (1.0 + change)).max(self.base_price * 0.1);
        let wick = open.max(close) * state.rng.gen_range(0.0..0.0005);
        state.price = close;

        Candle {
            timestamp,
            open,
            high: open.max(close) + wick,
            low: open.min(close) - wick,
            close,
            volume: self.base_volume * volume_multiplier,
        }
    }
}

#[async_trait]
impl MarketDataSource for SyntheticSource {
    async fn fetch_candles(&self, _symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        let interval = Duration::seconds(
            timeframe_seconds(timeframe)
                .with_context(|| format!("Unsupported timeframe: {}", timeframe))?,
        );

        let mut state = self
            .state
            .lock()
            .map_err(|e| anyhow::anyhow!("Synthetic feed lock poisoned: {}", e))?;

        if state.candles.is_empty() {
            let start = Utc::now() - interval * limit as i32;
            for i in 0..limit {
                let candle = self.next_candle(&mut state, start + interval * i as i32);
                state.candles.push_back(candle);
            }
        } else {
            let timestamp = state
                .candles
                .back()
                .map(|c| c.timestamp + interval)
                .unwrap_or_else(Utc::now);
            let candle = self.next_candle(&mut state, timestamp);
            state.candles.push_back(candle);
        }

        while state.candles.len() > limit {
            state.candles.pop_front();
        }

        Ok(state.candles.iter().cloned().collect())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_fetch_backfills() {
        let source = SyntheticSource::new(42, 100.0);
        let candles = source.fetch_candles("BTC/USDT", "1m", 200).await.unwrap();

        assert_eq!(candles.len(), 200);
        for pair in candles.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::minutes(1));
        }
    }

    #[tokio::test]
    async fn test_each_fetch_adds_one_candle() {
        let source = SyntheticSource::new(7, 100.0);
        let first = source.fetch_candles("BTC/USDT", "1m", 50).await.unwrap();
        let second = source.fetch_candles("BTC/USDT", "1m", 50).await.unwrap();

        assert_eq!(second.len(), 50);
        assert_eq!(second[48], first[49]);
        assert_eq!(
            second[49].timestamp - first[49].timestamp,
            Duration::minutes(1)
        );
    }

    #[tokio::test]
    async fn test_candles_are_consistent() {
        let source = SyntheticSource::new(1, 250.0);
        let candles = source.fetch_candles("X", "5m", 500).await.unwrap();

        for candle in &candles {
            assert!(candle.low <= candle.open.min(candle.close));
            assert!(candle.high >= candle.open.max(candle.close));
            assert!(candle.volume > 0.0);
            assert!(candle.close > 0.0);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_prices() {
        let a = SyntheticSource::new(99, 100.0);
        let b = SyntheticSource::new(99, 100.0);

        let ca = a.fetch_candles("X", "1m", 100).await.unwrap();
        let cb = b.fetch_candles("X", "1m", 100).await.unwrap();

        let closes_a: Vec<f64> = ca.iter().map(|c| c.close).collect();
        let closes_b: Vec<f64> = cb.iter().map(|c| c.close).collect();
        assert_eq!(closes_a, closes_b);
    }

    #[tokio::test]
    async fn test_unknown_timeframe() {
        let source = SyntheticSource::new(1, 100.0);
        assert!(source.fetch_candles("X", "bogus", 10).await.is_err());
    }
}
