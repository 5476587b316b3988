// ===============================
// src/vol.rs
// ===============================
//
// Rolling volatility over natural-log returns. Both the risk engine and the
// market maker keep their own per-symbol instance; prices arrive from fills
// on one side and from quote mids on the other.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct VolatilityEstimator {
    window: usize,
    prices: VecDeque<f64>,
    returns: VecDeque<f64>,
}

impl VolatilityEstimator {
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            prices: VecDeque::with_capacity(window),
            returns: VecDeque::with_capacity(window - 1),
        }
    }

    /// Ingest a price. The first observation only seeds the window; returns
    /// start accumulating from the second price on. Non-positive or
    /// non-finite prices are ignored.
    pub fn update(&mut self, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        if let Some(&prev) = self.prices.back() {
            let r = (price / prev).ln();
            if r.is_finite() {
                if self.returns.len() == self.window - 1 {
                    self.returns.pop_front();
                }
                self.returns.push_back(r);
            }
        }
        if self.prices.len() == self.window {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    /// Standard deviation of the return window: sqrt(E[r²] − E[r]²).
    /// Zero until two returns exist; degenerate arithmetic collapses to zero
    /// instead of propagating NaN.
    pub fn volatility(&self) -> f64 {
        let n = self.returns.len();
        if n < 2 {
            return 0.0;
        }
        let inv = 1.0 / n as f64;
        let mean = self.returns.iter().sum::<f64>() * inv;
        let mean_sq = self.returns.iter().map(|r| r * r).sum::<f64>() * inv;
        let var = mean_sq - mean * mean;
        if var.is_finite() && var > 0.0 {
            var.sqrt()
        } else {
            0.0
        }
    }

    pub fn observations(&self) -> usize {
        self.prices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_until_two_returns() {
        let mut v = VolatilityEstimator::new(16);
        assert_eq!(v.volatility(), 0.0);
        v.update(100.0);
        assert_eq!(v.volatility(), 0.0);
        v.update(101.0); // one return
        assert_eq!(v.volatility(), 0.0);
        v.update(100.0); // two returns, nonzero spread
        assert!(v.volatility() > 0.0);
    }

    #[test]
    fn constant_prices_have_zero_volatility() {
        let mut v = VolatilityEstimator::new(8);
        for _ in 0..20 {
            v.update(50.0);
        }
        assert_eq!(v.volatility(), 0.0);
    }

    #[test]
    fn ignores_non_positive_and_nan() {
        let mut v = VolatilityEstimator::new(8);
        v.update(100.0);
        v.update(0.0);
        v.update(-5.0);
        v.update(f64::NAN);
        v.update(f64::INFINITY);
        assert_eq!(v.observations(), 1);
        assert_eq!(v.volatility(), 0.0);
    }

    #[test]
    fn matches_direct_computation() {
        let mut v = VolatilityEstimator::new(16);
        let prices = [100.0, 102.0, 101.0, 103.0, 99.0];
        for p in prices {
            v.update(p);
        }
        let rets: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let mean = rets.iter().sum::<f64>() / rets.len() as f64;
        let mean_sq = rets.iter().map(|r| r * r).sum::<f64>() / rets.len() as f64;
        let expect = (mean_sq - mean * mean).sqrt();
        assert!((v.volatility() - expect).abs() < 1e-12);
    }

    #[test]
    fn window_evicts_oldest_return() {
        let mut v = VolatilityEstimator::new(3); // keeps at most 2 returns
        v.update(100.0);
        v.update(200.0); // big early jump
        v.update(200.0);
        v.update(200.0);
        v.update(200.0);
        // the 100->200 return has been evicted; remaining returns are all zero
        assert_eq!(v.volatility(), 0.0);
    }
}
