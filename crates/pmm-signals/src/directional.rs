//! Directional signal: Kalman trend gated by QQE momentum.
//!
//! A constant-velocity Kalman filter (state = price level + slope) tracks the
//! trend; a QQE indicator on RSI confirms momentum. The combined output is a
//! discrete trend in {-1, 0, +1}, used only to bias quotes, never to take
//! directional risk outright.
//!
//! Hysteresis: once non-zero, the emitted trend holds until the opposite raw
//! signal has been observed for `flip_ticks` consecutive updates.

use serde::{Deserialize, Serialize};

/// Discrete trend output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Bearish,
    Neutral,
    Bullish,
}

impl Trend {
    /// -1, 0 or +1.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Bearish => -1,
            Self::Neutral => 0,
            Self::Bullish => 1,
        }
    }
}

/// Directional signal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionalConfig {
    /// Kalman process noise Q. Higher = more responsive.
    #[serde(default = "default_process_noise")]
    pub process_noise: f64,
    /// Kalman observation noise R. Higher = smoother.
    #[serde(default = "default_observation_noise")]
    pub observation_noise: f64,
    /// RSI period for QQE.
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    /// EMA smoothing span for QQE.
    #[serde(default = "default_qqe_smoothing")]
    pub qqe_smoothing: usize,
    /// Band multiplier for QQE.
    #[serde(default = "default_qqe_factor")]
    pub qqe_factor: f64,
    /// Minimum normalised slope magnitude to call a trend.
    #[serde(default = "default_slope_threshold")]
    pub slope_threshold: f64,
    /// Consecutive opposite ticks required to flip a held trend.
    #[serde(default = "default_flip_ticks")]
    pub flip_ticks: u32,
}

impl Default for DirectionalConfig {
    fn default() -> Self {
        Self {
            process_noise: default_process_noise(),
            observation_noise: default_observation_noise(),
            rsi_period: default_rsi_period(),
            qqe_smoothing: default_qqe_smoothing(),
            qqe_factor: default_qqe_factor(),
            slope_threshold: default_slope_threshold(),
            flip_ticks: default_flip_ticks(),
        }
    }
}

fn default_process_noise() -> f64 {
    0.005
}
fn default_observation_noise() -> f64 {
    0.1
}
fn default_rsi_period() -> usize {
    14
}
fn default_qqe_smoothing() -> usize {
    5
}
fn default_qqe_factor() -> f64 {
    3.5
}
fn default_slope_threshold() -> f64 {
    1e-4
}
fn default_flip_ticks() -> u32 {
    3
}

/// Constant-velocity Kalman filter over a scalar observation.
///
/// State x = [level, slope], F = [[1, 1], [0, 1]], H = [1, 0].
#[derive(Debug)]
struct TrendKalman {
    level: f64,
    slope: f64,
    // Covariance, symmetric 2x2.
    p00: f64,
    p01: f64,
    p11: f64,
    q: f64,
    r: f64,
    seeded: bool,
}

impl TrendKalman {
    fn new(q: f64, r: f64) -> Self {
        Self {
            level: 0.0,
            slope: 0.0,
            p00: 1.0,
            p01: 0.0,
            p11: 1.0,
            q,
            r,
            seeded: false,
        }
    }

    fn update(&mut self, z: f64) {
        if !self.seeded {
            self.level = z;
            self.slope = 0.0;
            self.seeded = true;
            return;
        }

        // Predict
        let level_p = self.level + self.slope;
        let slope_p = self.slope;
        let p00 = self.p00 + 2.0 * self.p01 + self.p11 + self.q;
        let p01 = self.p01 + self.p11;
        let p11 = self.p11 + self.q;

        // Update with scalar observation of the level
        let innovation = z - level_p;
        let s = p00 + self.r;
        let k0 = p00 / s;
        let k1 = p01 / s;

        self.level = level_p + k0 * innovation;
        self.slope = slope_p + k1 * innovation;
        self.p00 = (1.0 - k0) * p00;
        self.p01 = (1.0 - k0) * p01;
        self.p11 = p11 - k1 * p01;
    }

    /// Slope normalised by the level, so thresholds are scale-free.
    fn normalized_slope(&self) -> f64 {
        if self.level.abs() < f64::EPSILON {
            0.0
        } else {
            self.slope / self.level
        }
    }
}

/// QQE: smoothed RSI against ratcheting dynamic bands.
#[derive(Debug)]
struct Qqe {
    rsi_period: usize,
    rsi_ema_mult: f64,
    atr_ema_mult: f64,
    factor: f64,
    prices: Vec<f64>,
    smoothed_rsi: Option<f64>,
    prev_smoothed_rsi: Option<f64>,
    rsi_atr: Option<f64>,
    long_band: f64,
    short_band: f64,
    bands_seeded: bool,
    trend: i8,
}

impl Qqe {
    fn new(rsi_period: usize, smoothing: usize, factor: f64) -> Self {
        Self {
            rsi_period: rsi_period.max(2),
            rsi_ema_mult: 2.0 / (smoothing as f64 + 1.0),
            atr_ema_mult: 2.0 / (rsi_period as f64 + 1.0),
            factor,
            prices: Vec::new(),
            smoothed_rsi: None,
            prev_smoothed_rsi: None,
            rsi_atr: None,
            long_band: 0.0,
            short_band: 0.0,
            bands_seeded: false,
            trend: 0,
        }
    }

    /// Feed a price. Returns (smoothed RSI, trend) once warmed.
    fn update(&mut self, price: f64) -> Option<(f64, i8)> {
        self.prices.push(price);
        if self.prices.len() > self.rsi_period * 4 {
            self.prices.drain(..self.prices.len() - self.rsi_period * 2);
        }
        if self.prices.len() < self.rsi_period + 1 {
            return None;
        }

        let n = self.prices.len();
        let changes = (n - self.rsi_period..n).map(|i| self.prices[i] - self.prices[i - 1]);
        let mut gains = 0.0;
        let mut losses = 0.0;
        for c in changes {
            if c > 0.0 {
                gains += c;
            } else {
                losses -= c;
            }
        }
        gains /= self.rsi_period as f64;
        losses /= self.rsi_period as f64;

        let rsi = if losses == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + gains / losses)
        };

        let smoothed = match self.smoothed_rsi {
            None => rsi,
            Some(prev) => (rsi - prev) * self.rsi_ema_mult + prev,
        };
        self.smoothed_rsi = Some(smoothed);

        if let Some(prev) = self.prev_smoothed_rsi {
            let change = (smoothed - prev).abs();
            self.rsi_atr = Some(match self.rsi_atr {
                None => change,
                Some(atr) => (change - atr) * self.atr_ema_mult + atr,
            });
        }
        let prev_s = self.prev_smoothed_rsi;
        self.prev_smoothed_rsi = Some(smoothed);

        let atr = self.rsi_atr?;
        let dar = atr * self.factor;
        let new_long = smoothed - dar;
        let new_short = smoothed + dar;

        if !self.bands_seeded {
            self.long_band = new_long;
            self.short_band = new_short;
            self.bands_seeded = true;
        } else {
            // Ratchet: long band only rises while price holds above it,
            // short band only falls while price holds below it.
            let anchor = prev_s.unwrap_or(smoothed);
            if anchor > self.long_band {
                self.long_band = new_long.max(self.long_band);
            } else {
                self.long_band = new_long;
            }
            if anchor < self.short_band {
                self.short_band = new_short.min(self.short_band);
            } else {
                self.short_band = new_short;
            }
        }

        if smoothed > self.short_band {
            self.trend = 1;
        } else if smoothed < self.long_band {
            self.trend = -1;
        }

        Some((smoothed, self.trend))
    }
}

/// Combined directional signal with hysteresis.
pub struct DirectionalSignal {
    kalman: TrendKalman,
    qqe: Qqe,
    config: DirectionalConfig,
    emitted: Trend,
    opposite_streak: u32,
    warmup_ticks: usize,
    ticks: usize,
}

impl DirectionalSignal {
    pub fn new(config: DirectionalConfig) -> Self {
        let warmup_ticks = config.rsi_period + config.qqe_smoothing + 5;
        Self {
            kalman: TrendKalman::new(config.process_noise, config.observation_noise),
            qqe: Qqe::new(config.rsi_period, config.qqe_smoothing, config.qqe_factor),
            config,
            emitted: Trend::Neutral,
            opposite_streak: 0,
            warmup_ticks,
            ticks: 0,
        }
    }

    /// Feed a price observation; returns the (possibly held) trend.
    pub fn update(&mut self, price: f64) -> Trend {
        self.ticks += 1;
        self.kalman.update(price);
        let qqe = self.qqe.update(price);

        if self.ticks < self.warmup_ticks {
            return self.emitted;
        }

        let raw = self.raw_trend(qqe);

        match (self.emitted, raw) {
            (Trend::Neutral, r) if r != Trend::Neutral => {
                self.emitted = r;
                self.opposite_streak = 0;
            }
            (held, r) if held != Trend::Neutral && r.sign() == -held.sign() => {
                self.opposite_streak += 1;
                if self.opposite_streak >= self.config.flip_ticks {
                    self.emitted = r;
                    self.opposite_streak = 0;
                }
            }
            _ => {
                self.opposite_streak = 0;
            }
        }

        self.emitted
    }

    /// Current held trend without feeding a new observation.
    pub fn trend(&self) -> Trend {
        self.emitted
    }

    fn raw_trend(&self, qqe: Option<(f64, i8)>) -> Trend {
        let slope = self.kalman.normalized_slope();
        let (qqe_value, qqe_trend) = match qqe {
            Some(v) => v,
            None => return Trend::Neutral,
        };

        // Sign of the Kalman slope, gated by QQE momentum: either a band
        // crossing or the smoothed RSI past the 55/45 thresholds. A trend
        // strong enough to pin RSI at an extreme never produces a band
        // crossing, hence the level fallback.
        if slope > self.config.slope_threshold && (qqe_trend == 1 || qqe_value > 55.0) {
            Trend::Bullish
        } else if slope < -self.config.slope_threshold && (qqe_trend == -1 || qqe_value < 45.0) {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> DirectionalConfig {
        DirectionalConfig {
            flip_ticks: 3,
            ..DirectionalConfig::default()
        }
    }

    #[test]
    fn test_neutral_during_warmup() {
        let mut sig = DirectionalSignal::new(fast_config());
        for i in 0..10 {
            assert_eq!(sig.update(100.0 + i as f64), Trend::Neutral);
        }
    }

    #[test]
    fn test_sustained_uptrend_is_bullish() {
        let mut sig = DirectionalSignal::new(fast_config());
        let mut price = 100.0;
        let mut last = Trend::Neutral;
        for _ in 0..120 {
            price *= 1.002;
            last = sig.update(price);
        }
        assert_eq!(last, Trend::Bullish);
    }

    #[test]
    fn test_sustained_downtrend_is_bearish() {
        let mut sig = DirectionalSignal::new(fast_config());
        let mut price = 100.0;
        let mut last = Trend::Neutral;
        for _ in 0..120 {
            price *= 0.998;
            last = sig.update(price);
        }
        assert_eq!(last, Trend::Bearish);
    }

    #[test]
    fn test_hysteresis_holds_through_brief_reversal() {
        let mut sig = DirectionalSignal::new(fast_config());
        let mut price = 100.0;
        for _ in 0..120 {
            price *= 1.002;
            sig.update(price);
        }
        assert_eq!(sig.trend(), Trend::Bullish);

        // Two down ticks are below flip_ticks=3: the held trend survives.
        price *= 0.999;
        sig.update(price);
        price *= 0.999;
        let t = sig.update(price);
        assert_eq!(t, Trend::Bullish);
    }

    #[test]
    fn test_flip_after_sustained_reversal() {
        let mut sig = DirectionalSignal::new(fast_config());
        let mut price = 100.0;
        for _ in 0..120 {
            price *= 1.002;
            sig.update(price);
        }
        let mut last = sig.trend();
        assert_eq!(last, Trend::Bullish);
        for _ in 0..120 {
            price *= 0.997;
            last = sig.update(price);
        }
        assert_eq!(last, Trend::Bearish);
    }

    #[test]
    fn test_kalman_tracks_slope() {
        let mut k = TrendKalman::new(0.01, 0.1);
        let mut z = 100.0;
        for _ in 0..200 {
            z += 1.0;
            k.update(z);
        }
        // Slope should converge near the true per-tick increment.
        assert!((k.slope - 1.0).abs() < 0.1, "slope={}", k.slope);
    }
}
