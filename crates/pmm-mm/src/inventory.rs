//! Inventory accounting for a single asset.
//!
//! Tracks the signed net position, weighted average entry, realised and
//! unrealised PnL, fees (positive = cost, negative = rebate), traded volume
//! and fill counters.

use pmm_core::{FillEvent, OrderSide, Price, Size};
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;

/// Per-asset inventory state.
#[derive(Debug, Clone)]
pub struct Inventory {
    symbol: String,
    max_position_usd: Decimal,
    /// Net position in contracts, signed.
    position: Decimal,
    avg_entry: Decimal,
    realized_pnl: Decimal,
    total_fees: Decimal,
    volume_usd: Decimal,
    buy_fills: u64,
    sell_fills: u64,
    round_trips: u64,
    daily_high_usd: Decimal,
    daily_low_usd: Decimal,
}

impl Inventory {
    pub fn new(symbol: impl Into<String>, max_position_usd: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            max_position_usd,
            position: Decimal::ZERO,
            avg_entry: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            total_fees: Decimal::ZERO,
            volume_usd: Decimal::ZERO,
            buy_fills: 0,
            sell_fills: 0,
            round_trips: 0,
            daily_high_usd: Decimal::ZERO,
            daily_low_usd: Decimal::ZERO,
        }
    }

    /// Process a fill. Returns the PnL realised by this fill (zero when
    /// opening or adding) together with the recorded event.
    pub fn record_fill(
        &mut self,
        side: OrderSide,
        price: Price,
        size: Size,
        fee: Decimal,
        now_ms: u64,
    ) -> (Decimal, FillEvent) {
        let px = price.inner();
        let qty = size.inner().abs();
        let signed = match side {
            OrderSide::Buy => qty,
            OrderSide::Sell => -qty,
        };

        let old_pos = self.position;
        let mut realized = Decimal::ZERO;

        let adding = old_pos.is_zero() || old_pos.signum() == signed.signum();
        if adding {
            // Opening or adding: weighted average entry.
            let total_cost = self.avg_entry * old_pos.abs() + px * qty;
            self.position = old_pos + signed;
            if !self.position.is_zero() {
                self.avg_entry = total_cost / self.position.abs();
            }
        } else {
            // Reducing: realise against the average entry.
            let close_size = qty.min(old_pos.abs());
            realized = if old_pos > Decimal::ZERO {
                (px - self.avg_entry) * close_size
            } else {
                (self.avg_entry - px) * close_size
            };
            self.position = old_pos + signed;

            if self.position.is_zero() {
                self.avg_entry = Decimal::ZERO;
            } else if self.position.signum() != old_pos.signum() {
                // Flipped through flat: the remainder is a fresh position.
                self.avg_entry = px;
            }
            if close_size > Decimal::ZERO {
                self.round_trips += 1;
            }
        }

        self.realized_pnl += realized;
        self.total_fees += fee;
        self.volume_usd += px * qty;
        match side {
            OrderSide::Buy => self.buy_fills += 1,
            OrderSide::Sell => self.sell_fills += 1,
        }

        let pos_usd = self.position * px;
        self.daily_high_usd = self.daily_high_usd.max(pos_usd);
        self.daily_low_usd = self.daily_low_usd.min(pos_usd);

        let event = FillEvent {
            side,
            price,
            size: Size::new(qty),
            fee,
            timestamp_ms: now_ms,
        };
        (realized, event)
    }

    /// Unrealised PnL at the given mid. Exactly zero when flat.
    pub fn mark_to_market(&self, mid: Price) -> Decimal {
        if self.position.is_zero() {
            return Decimal::ZERO;
        }
        if self.position > Decimal::ZERO {
            (mid.inner() - self.avg_entry) * self.position
        } else {
            (self.avg_entry - mid.inner()) * self.position.abs()
        }
    }

    /// Realised PnL net of fees.
    pub fn net_pnl(&self) -> Decimal {
        self.realized_pnl - self.total_fees
    }

    /// Realised + unrealised, net of fees.
    pub fn total_pnl(&self, mid: Price) -> Decimal {
        self.realized_pnl + self.mark_to_market(mid) - self.total_fees
    }

    /// Net position in contracts, signed.
    pub fn position(&self) -> Size {
        Size::new(self.position)
    }

    /// Position notional at the given mid, signed.
    pub fn position_usd(&self, mid: Price) -> Decimal {
        self.position * mid.inner()
    }

    /// Position as a signed fraction of max, clamped to [-1, 1].
    pub fn inventory_ratio(&self, mid: Price) -> Decimal {
        if self.max_position_usd.is_zero() {
            return Decimal::ZERO;
        }
        (self.position_usd(mid) / self.max_position_usd)
            .max(Decimal::NEGATIVE_ONE)
            .min(Decimal::ONE)
    }

    pub fn avg_entry(&self) -> Decimal {
        self.avg_entry
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    pub fn volume_usd(&self) -> Decimal {
        self.volume_usd
    }

    pub fn fill_counts(&self) -> (u64, u64) {
        (self.buy_fills, self.sell_fills)
    }

    pub fn round_trips(&self) -> u64 {
        self.round_trips
    }

    pub fn daily_extremes_usd(&self) -> (Decimal, Decimal) {
        (self.daily_high_usd, self.daily_low_usd)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn set_max_position_usd(&mut self, max_position_usd: Decimal) {
        self.max_position_usd = max_position_usd;
    }

    /// Reset daily extremes at the day boundary.
    pub fn reset_daily(&mut self) {
        self.daily_high_usd = Decimal::ZERO;
        self.daily_low_usd = Decimal::ZERO;
    }

    /// Overwrite the tracked position after a venue reconciliation.
    ///
    /// Used when the adapter-reported position disagrees with ours beyond
    /// tolerance: adopt the venue's size and re-seed the entry at the given
    /// price (flat-at-mid heuristic).
    pub fn force_position(&mut self, position: Size, entry: Price) {
        self.position = position.inner();
        self.avg_entry = if self.position.is_zero() {
            Decimal::ZERO
        } else {
            entry.inner()
        };
    }
}
