// Technical indicators module
// Implements RSI and rolling VWAP over a candle window

pub mod rsi;
pub mod vwap;

pub use rsi::{calculate_rsi, calculate_rsi_series};
pub use vwap::{calculate_vwap, calculate_vwap_series};

use crate::models::{closes, volumes, Candle};

/// Per-candle indicator values, aligned with the candle series
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub rsi: Vec<Option<f64>>,
    pub vwap: Vec<Option<f64>>,
}

/// Indicator values at the newest candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub vwap: Option<f64>,
}

impl IndicatorFrame {
    /// Recompute every indicator from the full series
    pub fn compute(candles: &[Candle], rsi_length: usize, vwap_window: usize) -> Self {
        let prices = closes(candles);
        let volumes = volumes(candles);

        Self {
            rsi: calculate_rsi_series(&prices, rsi_length),
            vwap: calculate_vwap_series(&prices, &volumes, vwap_window),
        }
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }

    pub fn latest(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: self.rsi.last().copied().flatten(),
            vwap: self.vwap.last().copied().flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn candles_from(prices: &[f64], volume: f64) -> Vec<Candle> {
        let start = Utc::now() - Duration::minutes(prices.len() as i64);
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle::flat(start + Duration::minutes(i as i64), p, volume))
            .collect()
    }

    #[test]
    fn test_frame_aligned_with_candles() {
        let candles = candles_from(&[100.0, 101.0, 99.0, 98.0, 102.0], 10.0);
        let frame = IndicatorFrame::compute(&candles, 3, 3);

        assert_eq!(frame.len(), 5);
        assert_eq!(frame.vwap.len(), 5);
        assert!(frame.rsi[0].is_none());
        assert!(frame.vwap[1].is_none());
        assert!(frame.vwap[2].is_some());
    }

    #[test]
    fn test_latest_snapshot() {
        let candles = candles_from(&[100.0; 10], 10.0);
        let snapshot = IndicatorFrame::compute(&candles, 7, 5).latest();

        assert_eq!(snapshot.rsi, Some(100.0));
        assert_eq!(snapshot.vwap, Some(100.0));
    }

    #[test]
    fn test_latest_without_full_window() {
        let candles = candles_from(&[100.0, 101.0], 10.0);
        let snapshot = IndicatorFrame::compute(&candles, 7, 60).latest();

        assert!(snapshot.rsi.is_some());
        assert!(snapshot.vwap.is_none());
    }

    #[test]
    fn test_empty_series() {
        let frame = IndicatorFrame::compute(&[], 7, 60);
        assert!(frame.is_empty());
        assert_eq!(
            frame.latest(),
            IndicatorSnapshot {
                rsi: None,
                vwap: None
            }
        );
    }
}
