//! Rolling per-asset performance metrics.
//!
//! Aggregates fills, PnL, spread capture and inventory usage into UTC day
//! buckets. A finalized bucket becomes a `DayRecord` for the persisted
//! history; the in-memory tail feeds Sharpe, drawdown and profitable-day
//! figures to the sizer, tuner and status logs.

use crate::history::DayRecord;
use std::collections::VecDeque;

const DAY_MS: u64 = 86_400_000;

/// Days of finalized history retained in memory.
const HISTORY_DAYS: usize = 30;

/// Rolling fill-rate over recent quote cycles.
#[derive(Debug)]
pub struct FillRateTracker {
    events: VecDeque<(u64, u64)>,
    window: usize,
}

impl FillRateTracker {
    pub fn new(window: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(window),
            window: window.max(1),
        }
    }

    /// Record one cycle: fills observed and quotes standing.
    pub fn record(&mut self, fills: u64, quotes: u64) {
        if self.events.len() >= self.window {
            self.events.pop_front();
        }
        self.events.push_back((fills, quotes.max(1)));
    }

    /// Total fills over total quotes in the window.
    pub fn rate(&self) -> f64 {
        let (fills, quotes) = self
            .events
            .iter()
            .fold((0u64, 0u64), |(f, q), (ef, eq)| (f + ef, q + eq));
        if quotes == 0 {
            0.0
        } else {
            fills as f64 / quotes as f64
        }
    }

    pub fn samples(&self) -> usize {
        self.events.len()
    }
}

/// Per-asset metrics with daily bucketing.
pub struct MetricsTracker {
    capital_usd: f64,
    day_start_ms: u64,

    // Current bucket.
    gross_pnl: f64,
    fees: f64,
    fills_buy: u64,
    fills_sell: u64,
    equity_peak: f64,
    max_drawdown: f64,
    inv_sum: f64,
    inv_samples: u64,
    inv_max: f64,
    quoted_spread_sum: f64,
    quoted_spread_samples: u64,
    captured_spread_sum: f64,
    captured_spread_samples: u64,
    toxicity_ema: f64,
    last_equity: f64,

    history: VecDeque<DayRecord>,
}

impl MetricsTracker {
    pub fn new(capital_usd: f64, now_ms: u64) -> Self {
        Self {
            capital_usd,
            day_start_ms: day_bucket_start(now_ms),
            gross_pnl: 0.0,
            fees: 0.0,
            fills_buy: 0,
            fills_sell: 0,
            equity_peak: 0.0,
            max_drawdown: 0.0,
            inv_sum: 0.0,
            inv_samples: 0,
            inv_max: 0.0,
            quoted_spread_sum: 0.0,
            quoted_spread_samples: 0,
            captured_spread_sum: 0.0,
            captured_spread_samples: 0,
            toxicity_ema: 0.0,
            last_equity: 0.0,
            history: VecDeque::new(),
        }
    }

    /// Seed finalized history (e.g. from the persisted CSV at startup).
    pub fn seed_history(&mut self, records: impl IntoIterator<Item = DayRecord>) {
        for r in records {
            if self.history.len() >= HISTORY_DAYS {
                self.history.pop_front();
            }
            self.history.push_back(r);
        }
    }

    /// Record a fill's contribution: realised pnl and fee.
    pub fn on_fill(&mut self, is_buy: bool, realized_pnl: f64, fee: f64, captured_bps: Option<f64>) {
        if is_buy {
            self.fills_buy += 1;
        } else {
            self.fills_sell += 1;
        }
        self.gross_pnl += realized_pnl;
        self.fees += fee;
        if let Some(bps) = captured_bps {
            self.captured_spread_sum += bps;
            self.captured_spread_samples += 1;
        }
    }

    /// Record per-tick state.
    ///
    /// `day_pnl` is the running day PnL net of fees (realised + unrealised);
    /// `inventory_util` the absolute utilisation in [0, 1].
    pub fn on_tick(
        &mut self,
        day_pnl: f64,
        inventory_util: f64,
        quoted_spread_bps: Option<f64>,
        toxicity: f64,
    ) {
        self.last_equity = day_pnl;
        self.equity_peak = self.equity_peak.max(day_pnl);
        self.max_drawdown = self.max_drawdown.max(self.equity_peak - day_pnl);
        self.inv_sum += inventory_util.abs();
        self.inv_samples += 1;
        self.inv_max = self.inv_max.max(inventory_util.abs());
        if let Some(bps) = quoted_spread_bps {
            self.quoted_spread_sum += bps;
            self.quoted_spread_samples += 1;
        }
        self.toxicity_ema = toxicity;
    }

    /// Roll the day bucket if the UTC day changed. Returns the finalized
    /// record to persist.
    pub fn maybe_roll_day(&mut self, now_ms: u64) -> Option<DayRecord> {
        let bucket = day_bucket_start(now_ms);
        if bucket == self.day_start_ms {
            return None;
        }
        let record = self.finalize_bucket();
        self.day_start_ms = bucket;
        Some(record)
    }

    fn finalize_bucket(&mut self) -> DayRecord {
        let record = DayRecord {
            day_bucket_start: self.day_start_ms,
            gross_pnl: self.gross_pnl,
            fees: self.fees,
            net_pnl: self.last_equity,
            fills_buy: self.fills_buy,
            fills_sell: self.fills_sell,
            max_drawdown: self.max_drawdown,
            inventory_avg: if self.inv_samples == 0 {
                0.0
            } else {
                self.inv_sum / self.inv_samples as f64
            },
            inventory_max: self.inv_max,
            quoted_spread_bps: if self.quoted_spread_samples == 0 {
                0.0
            } else {
                self.quoted_spread_sum / self.quoted_spread_samples as f64
            },
            captured_spread_bps: if self.captured_spread_samples == 0 {
                0.0
            } else {
                self.captured_spread_sum / self.captured_spread_samples as f64
            },
            toxicity_ema: self.toxicity_ema,
        };

        if self.history.len() >= HISTORY_DAYS {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());

        self.gross_pnl = 0.0;
        self.fees = 0.0;
        self.fills_buy = 0;
        self.fills_sell = 0;
        self.equity_peak = 0.0;
        self.max_drawdown = 0.0;
        self.inv_sum = 0.0;
        self.inv_samples = 0;
        self.inv_max = 0.0;
        self.quoted_spread_sum = 0.0;
        self.quoted_spread_samples = 0;
        self.captured_spread_sum = 0.0;
        self.captured_spread_samples = 0;
        self.last_equity = 0.0;

        record
    }

    /// Annualised Sharpe over finalized daily net PnL.
    pub fn sharpe(&self) -> f64 {
        let returns: Vec<f64> = self.history.iter().map(|r| r.net_pnl).collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        if var <= 0.0 {
            return 0.0;
        }
        mean / var.sqrt() * (365f64).sqrt()
    }

    /// Fraction of finalized days with positive net PnL.
    pub fn profitable_day_ratio(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().filter(|r| r.net_pnl > 0.0).count() as f64 / self.history.len() as f64
    }

    /// Trailing 7-day drawdown as a fraction of capital, including today.
    pub fn drawdown_7d(&self) -> f64 {
        if self.capital_usd <= 0.0 {
            return 0.0;
        }
        let mut cumulative = 0.0;
        let mut peak = 0.0;
        let mut worst = 0.0f64;
        for r in self.history.iter().rev().take(6).collect::<Vec<_>>().into_iter().rev() {
            cumulative += r.net_pnl;
            peak = f64::max(peak, cumulative);
            worst = worst.max(peak - cumulative);
        }
        cumulative += self.last_equity;
        peak = f64::max(peak, cumulative);
        worst = worst.max(peak - cumulative);
        worst.max(self.max_drawdown) / self.capital_usd
    }

    pub fn history(&self) -> impl Iterator<Item = &DayRecord> {
        self.history.iter()
    }

    pub fn day_fills(&self) -> (u64, u64) {
        (self.fills_buy, self.fills_sell)
    }

    pub fn set_capital(&mut self, capital_usd: f64) {
        self.capital_usd = capital_usd;
    }
}

fn day_bucket_start(now_ms: u64) -> u64 {
    now_ms / DAY_MS * DAY_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rate_tracker() {
        let mut t = FillRateTracker::new(10);
        t.record(1, 4);
        t.record(0, 4);
        assert!((t.rate() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_fill_rate_window_rolls() {
        let mut t = FillRateTracker::new(2);
        t.record(4, 4); // evicted
        t.record(0, 4);
        t.record(0, 4);
        assert_eq!(t.rate(), 0.0);
    }

    #[test]
    fn test_day_roll_produces_record() {
        let mut m = MetricsTracker::new(10_000.0, 0);
        m.on_fill(true, 1.0, 0.1, Some(3.0));
        m.on_fill(false, 2.0, 0.1, None);
        m.on_tick(2.8, 0.4, Some(4.0), 0.25);

        assert!(m.maybe_roll_day(1_000).is_none());

        let record = m.maybe_roll_day(DAY_MS + 1).expect("day rolled");
        assert_eq!(record.day_bucket_start, 0);
        assert_eq!(record.fills_buy, 1);
        assert_eq!(record.fills_sell, 1);
        assert!((record.gross_pnl - 3.0).abs() < 1e-12);
        assert!((record.fees - 0.2).abs() < 1e-12);
        assert!((record.net_pnl - 2.8).abs() < 1e-12);
        assert!((record.inventory_avg - 0.4).abs() < 1e-12);
        assert!((record.captured_spread_bps - 3.0).abs() < 1e-12);

        // Counters reset for the new day.
        assert_eq!(m.day_fills(), (0, 0));
    }

    #[test]
    fn test_drawdown_tracked_within_day() {
        let mut m = MetricsTracker::new(10_000.0, 0);
        m.on_tick(5.0, 0.0, None, 0.0);
        m.on_tick(-3.0, 0.0, None, 0.0);
        let record = m.maybe_roll_day(DAY_MS).unwrap();
        assert!((record.max_drawdown - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_sign() {
        let mut m = MetricsTracker::new(10_000.0, 0);
        for (i, pnl) in [10.0, 12.0, 8.0, 11.0].iter().enumerate() {
            m.on_tick(*pnl, 0.0, None, 0.0);
            m.maybe_roll_day((i as u64 + 1) * DAY_MS);
        }
        assert!(m.sharpe() > 0.0);
        assert_eq!(m.profitable_day_ratio(), 1.0);
    }

    #[test]
    fn test_drawdown_7d_fraction_of_capital() {
        let mut m = MetricsTracker::new(1_000.0, 0);
        // Day 0: +50, day 1: -30.
        m.on_tick(50.0, 0.0, None, 0.0);
        m.maybe_roll_day(DAY_MS);
        m.on_tick(-30.0, 0.0, None, 0.0);
        // Peak 50, current 20: drawdown 30 over $1k capital = 3%.
        assert!((m.drawdown_7d() - 0.03).abs() < 1e-9);
    }
}
