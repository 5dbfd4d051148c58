/// Added to the average loss so a flat-loss window never divides by zero
const RS_EPSILON: f64 = 1e-9;

/// Calculate Relative Strength Index (RSI) for every index of `prices`
///
/// Gains and losses are smoothed with an exponential average whose newest
/// sample carries weight `1 / period` (Wilder smoothing, centre of mass
/// `period - 1`). The average is seeded with the first price change, so
/// only index 0 has no value.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// A window without any downward move (including a flat series) reads 100.
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut series = vec![None; prices.len()];
    if period == 0 || prices.len() < 2 {
        return series;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..prices.len() {
        let change = prices[i] - prices[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = (1.0 - alpha) * avg_gain + alpha * gain;
            avg_loss = (1.0 - alpha) * avg_loss + alpha * loss;
        }

        series[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    series
}

/// Latest RSI value, if any
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    calculate_rsi_series(prices, period).last().copied().flatten()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / (avg_loss + RS_EPSILON);
    100.0 - (100.0 / (1.0 + rs))
}
