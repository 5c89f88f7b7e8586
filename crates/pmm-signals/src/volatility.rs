//! Volatility estimation.
//!
//! Two trackers with different jobs:
//! - `EwmaVolatility` smooths absolute log-returns into a bps figure that
//!   widens the quoted spread.
//! - `AtrTracker` keeps a rolling mean of per-tick price ranges; it
//!   normalises toxicity scores and feeds the skew term.

use std::collections::VecDeque;

/// EMA of absolute log-returns, expressed in basis points.
#[derive(Debug)]
pub struct EwmaVolatility {
    alpha: f64,
    ema: f64,
    last_mid: Option<f64>,
    samples: usize,
    min_samples: usize,
}

impl EwmaVolatility {
    /// `half_life_ticks` controls smoothing: after that many ticks an
    /// observation's weight has decayed to one half.
    pub fn new(half_life_ticks: f64, min_samples: usize) -> Self {
        let alpha = 1.0 - 0.5f64.powf(1.0 / half_life_ticks.max(1.0));
        Self {
            alpha,
            ema: 0.0,
            last_mid: None,
            samples: 0,
            min_samples,
        }
    }

    /// Feed a new mid price. Returns the current estimate in bps.
    pub fn update(&mut self, mid: f64) -> f64 {
        if let Some(last) = self.last_mid {
            if last > 0.0 && mid > 0.0 {
                let ret = (mid / last).ln().abs();
                if self.samples == 0 {
                    self.ema = ret;
                } else {
                    self.ema = self.alpha * ret + (1.0 - self.alpha) * self.ema;
                }
                self.samples += 1;
            }
        }
        self.last_mid = Some(mid);
        self.sigma_bps()
    }

    /// Current volatility estimate in basis points.
    pub fn sigma_bps(&self) -> f64 {
        self.ema * 10_000.0
    }

    /// Whether enough returns have been observed for the estimate to be used.
    pub fn is_warm(&self) -> bool {
        self.samples >= self.min_samples
    }
}

/// Rolling mean of per-tick high-low ranges, an ATR proxy.
///
/// With only mid prices available, the tick range is approximated as the
/// movement between consecutive mids.
#[derive(Debug)]
pub struct AtrTracker {
    ranges: VecDeque<f64>,
    window: usize,
    last_mid: Option<f64>,
}

impl AtrTracker {
    pub fn new(window: usize) -> Self {
        Self {
            ranges: VecDeque::with_capacity(window),
            window: window.max(1),
            last_mid: None,
        }
    }

    /// Feed a new mid price. Returns the current ATR in price units.
    pub fn update(&mut self, mid: f64) -> f64 {
        if let Some(last) = self.last_mid {
            let range = (mid - last).abs();
            if self.ranges.len() >= self.window {
                self.ranges.pop_front();
            }
            self.ranges.push_back(range);
        }
        self.last_mid = Some(mid);
        self.atr()
    }

    /// Current ATR in price units. 0 until at least one range is recorded.
    pub fn atr(&self) -> f64 {
        if self.ranges.is_empty() {
            return 0.0;
        }
        self.ranges.iter().sum::<f64>() / self.ranges.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_prices_zero_vol() {
        let mut vol = EwmaVolatility::new(20.0, 3);
        for _ in 0..10 {
            vol.update(100.0);
        }
        assert_eq!(vol.sigma_bps(), 0.0);
        assert!(vol.is_warm());
    }

    #[test]
    fn test_constant_return_converges() {
        let mut vol = EwmaVolatility::new(10.0, 3);
        let mut mid = 100.0;
        for _ in 0..200 {
            mid *= 1.001; // 10 bps per tick
            vol.update(mid);
        }
        // |ln(1.001)| ~= 9.995 bps
        assert!((vol.sigma_bps() - 9.995).abs() < 0.1);
    }

    #[test]
    fn test_warm_up_gate() {
        let mut vol = EwmaVolatility::new(20.0, 5);
        vol.update(100.0);
        vol.update(100.1);
        assert!(!vol.is_warm());
    }

    #[test]
    fn test_atr_mean_range() {
        let mut atr = AtrTracker::new(3);
        atr.update(100.0);
        atr.update(101.0); // range 1.0
        atr.update(100.5); // range 0.5
        assert!((atr.atr() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_atr_window_rolls(){
        let mut atr = AtrTracker::new(2);
        atr.update(100.0);
        atr.update(104.0); // 4
        atr.update(104.0); // 0
        atr.update(105.0); // 1, evicts the 4
        assert!((atr.atr() - 0.5).abs() < 1e-12);
    }
}
