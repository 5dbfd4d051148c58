/// RSI level at or below which the market counts as oversold
pub const RSI_OVERSOLD: f64 = 32.0;

/// Configuration for entry signal evaluation
#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// Minimum discount to VWAP before entering (0.0025 = price 0.25% below VWAP)
    pub dd_min: f64,
    pub rsi_oversold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            dd_min: 0.0025,
            rsi_oversold: RSI_OVERSOLD,
        }
    }
}

impl SignalConfig {
    pub fn new(dd_min: f64) -> Self {
        Self {
            dd_min,
            ..Default::default()
        }
    }
}

/// Outcome of evaluating the entry rule on one candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntrySignal {
    /// `(vwap - price) / vwap`, positive when price trades below VWAP
    pub deviation: f64,
    pub rsi: f64,
    pub should_long: bool,
}

/// Relative distance of `price` below `vwap`
///
/// Returns None for a VWAP that cannot be divided by.
pub fn deviation(price: f64, vwap: f64) -> Option<f64> {
    if !vwap.is_finite() || vwap <= 0.0 {
        return None;
    }
    Some((vwap - price) / vwap)
}

/// Evaluate the long entry rule
///
/// Entry requires price at least `dd_min` below VWAP AND RSI at or below the
/// oversold level. The caller is responsible for checking that no position
/// is open and that the cooldown has elapsed.
pub fn evaluate_entry(price: f64, rsi: f64, vwap: f64, config: &SignalConfig) -> Option<EntrySignal> {
    let deviation = deviation(price, vwap)?;
    if !rsi.is_finite() || !price.is_finite() {
        return None;
    }

    Some(EntrySignal {
        deviation,
        rsi,
        should_long: deviation >= config.dd_min && rsi <= config.rsi_oversold,
    })
}
