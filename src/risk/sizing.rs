use serde::{Deserialize, Serialize};

/// Smallest order quantity the sizer will return for a valid stop
pub const DEFAULT_MIN_QUANTITY: f64 = 0.0001;

/// Calculate order quantity so that hitting the stop loses `equity * risk_fraction`
///
/// The dollar risk per trade is fixed, not the dollar exposure. A zero or
/// negative stop distance returns 0.0, meaning "do not trade". Otherwise the
/// result is never below `min_quantity`.
pub fn desired_quantity(
    price: f64,
    equity: f64,
    risk_fraction: f64,
    stop_offset: f64,
    min_quantity: f64,
) -> f64 {
    let risk_amount = equity * risk_fraction;
    let stop_distance = price * stop_offset;

    if stop_distance <= 0.0 || !stop_distance.is_finite() {
        return 0.0;
    }

    (risk_amount / stop_distance).max(min_quantity)
}

/// Risk-based position sizing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSizer {
    pub risk_fraction: f64,
    pub stop_offset: f64,
    pub min_quantity: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            risk_fraction: 0.02, // 2% of equity at risk per trade
            stop_offset: 0.006,  // stop 0.6% below entry
            min_quantity: DEFAULT_MIN_QUANTITY,
        }
    }
}

impl PositionSizer {
    pub fn quantity(&self, price: f64, equity: f64) -> f64 {
        desired_quantity(
            price,
            equity,
            self.risk_fraction,
            self.stop_offset,
            self.min_quantity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sizing() {
        // risk = 300 * 0.02 = 6, stop = 100 * 0.006 = 0.6 -> 10 units
        let qty = desired_quantity(100.0, 300.0, 0.02, 0.006, DEFAULT_MIN_QUANTITY);
        assert!((qty - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_stop_means_no_trade() {
        assert_eq!(desired_quantity(100.0, 300.0, 0.02, 0.0, 0.0001), 0.0);
        assert_eq!(desired_quantity(100.0, 300.0, 0.02, -0.01, 0.0001), 0.0);
        assert_eq!(desired_quantity(0.0, 300.0, 0.02, 0.006, 0.0001), 0.0);
    }

    #[test]
    fn test_floor_applies() {
        // Tiny equity would size below the floor
        let qty = desired_quantity(60000.0, 1.0, 0.01, 0.006, 0.0001);
        assert_eq!(qty, 0.0001);

        let qty = desired_quantity(100.0, 0.0, 0.02, 0.006, 0.0001);
        assert_eq!(qty, 0.0001);
    }

    #[test]
    fn test_monotonic_in_equity() {
        let mut previous = 0.0;
        for equity in [50.0, 100.0, 300.0, 1000.0, 5000.0] {
            let qty = desired_quantity(100.0, equity, 0.02, 0.006, 0.0001);
            assert!(qty >= previous);
            previous = qty;
        }
    }

    #[test]
    fn test_monotonic_in_stop_offset() {
        let mut previous = f64::INFINITY;
        for stop in [0.001, 0.003, 0.006, 0.01, 0.05] {
            let qty = desired_quantity(100.0, 300.0, 0.02, stop, 0.0001);
            assert!(qty <= previous);
            assert!(qty > 0.0);
            previous = qty;
        }
    }

    #[test]
    fn test_sizer_struct() {
        let sizer = PositionSizer::default();
        assert!((sizer.quantity(100.0, 300.0) - 10.0).abs() < 1e-9);
    }
}
