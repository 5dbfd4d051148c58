/// Calculate rolling Volume-Weighted Average Price for every index
///
/// Each value is `sum(close * volume) / sum(volume)` over the trailing
/// `window` candles. Indices before the window fills have no value, and
/// neither does any window whose volume sums to exactly zero.
pub fn calculate_vwap_series(prices: &[f64], volumes: &[f64], window: usize) -> Vec<Option<f64>> {
    let len = prices.len().min(volumes.len());
    let mut series = vec![None; len];
    if window == 0 || len < window {
        return series;
    }

    for end in window..=len {
        let start = end - window;
        let volume_sum: f64 = volumes[start..end].iter().sum();
        if volume_sum == 0.0 {
            continue;
        }

        let pv_sum: f64 = prices[start..end]
            .iter()
            .zip(&volumes[start..end])
            .map(|(p, v)| p * v)
            .sum();

        let vwap = pv_sum / volume_sum;
        if vwap.is_finite() {
            series[end - 1] = Some(vwap);
        }
    }

    series
}

/// Latest VWAP value, if any
pub fn calculate_vwap(prices: &[f64], volumes: &[f64], window: usize) -> Option<f64> {
    calculate_vwap_series(prices, volumes, window)
        .last()
        .copied()
        .flatten()
}
