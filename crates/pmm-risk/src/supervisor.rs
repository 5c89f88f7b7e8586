//! Risk state machine.
//!
//! Evaluated every tick. Transitions:
//! - trailing-day net PnL at or below -max_daily_loss * capital trips the
//!   circuit breaker until the next UTC day boundary;
//! - API-error weight in the trailing 60 s at or above threshold trips it
//!   for `cooldown_seconds`;
//! - |position| at or above max_position_usd masks the overloaded side;
//! - otherwise SAFE.
//!
//! The breaker is monotonic: once tripped it can only be released by the
//! clock passing its deadline.

use crate::error::{RiskError, RiskResult};
use chrono::{DateTime, Days, Utc};
use pmm_core::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{error, warn};

/// API-error window for the error budget.
const ERROR_WINDOW_MS: u64 = 60_000;

/// Risk management limits, immutable per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum inventory notional per asset, USD.
    #[serde(default = "default_max_position_usd")]
    pub max_position_usd: Decimal,
    /// Daily loss limit as a fraction of capital.
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
    /// Maximum live orders per asset.
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,
    /// Circuit-breaker cooldown after an error-budget trip.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Weighted API errors per minute that trip the breaker.
    #[serde(default = "default_api_error_threshold")]
    pub api_error_threshold: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_usd: default_max_position_usd(),
            max_daily_loss: default_max_daily_loss(),
            max_open_orders: default_max_open_orders(),
            cooldown_seconds: default_cooldown_seconds(),
            api_error_threshold: default_api_error_threshold(),
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> RiskResult<()> {
        if !self.max_position_usd.is_sign_positive() || self.max_position_usd.is_zero() {
            return Err(RiskError::InvalidLimits("max_position_usd must be > 0".into()));
        }
        if !self.max_daily_loss.is_sign_positive() || self.max_daily_loss.is_zero() {
            return Err(RiskError::InvalidLimits("max_daily_loss must be > 0".into()));
        }
        if self.max_open_orders == 0 {
            return Err(RiskError::InvalidLimits("max_open_orders must be > 0".into()));
        }
        if self.cooldown_seconds == 0 {
            return Err(RiskError::InvalidLimits("cooldown_seconds must be > 0".into()));
        }
        if self.api_error_threshold <= 0.0 {
            return Err(RiskError::InvalidLimits(
                "api_error_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_max_position_usd() -> Decimal {
    Decimal::from(500)
}
fn default_max_daily_loss() -> Decimal {
    Decimal::new(5, 2) // 5% of capital
}
fn default_max_open_orders() -> usize {
    12
}
fn default_cooldown_seconds() -> u64 {
    120
}
fn default_api_error_threshold() -> f64 {
    5.0
}

/// Why the circuit breaker tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    DailyLoss,
    ErrorBudget,
    Fatal,
}

impl std::fmt::Display for BreakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyLoss => write!(f, "daily loss limit"),
            Self::ErrorBudget => write!(f, "api error budget"),
            Self::Fatal => write!(f, "fatal venue error"),
        }
    }
}

/// Gating state returned to the strategy loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskState {
    Safe,
    /// Position at the limit: the given side must not be quoted.
    PositionLimit { masked: OrderSide },
    CircuitBreak { until_ms: u64, reason: BreakReason },
}

impl RiskState {
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    pub fn is_break(&self) -> bool {
        matches!(self, Self::CircuitBreak { .. })
    }
}

/// Per-asset risk supervisor.
pub struct RiskSupervisor {
    limits: RiskLimits,
    capital_usd: Decimal,
    /// (timestamp_ms, weight) of recent API errors.
    errors: VecDeque<(u64, f64)>,
    breaker: Option<(u64, BreakReason)>,
}

impl RiskSupervisor {
    pub fn new(limits: RiskLimits, capital_usd: Decimal) -> Self {
        Self {
            limits,
            capital_usd,
            errors: VecDeque::new(),
            breaker: None,
        }
    }

    /// Record an API error with a weight (1.0 for a real failure, lower for
    /// benign rejections such as post-only crosses).
    pub fn on_api_error(&mut self, now_ms: u64, weight: f64) {
        self.errors.push_back((now_ms, weight));
        while let Some(&(ts, _)) = self.errors.front() {
            if now_ms.saturating_sub(ts) > ERROR_WINDOW_MS {
                self.errors.pop_front();
            } else {
                break;
            }
        }
    }

    /// Trip the breaker immediately (credentials failure, operator stop).
    pub fn force_break(&mut self, now_ms: u64, reason: BreakReason) {
        let until = now_ms + self.limits.cooldown_seconds * 1000;
        error!(%reason, until_ms = until, "circuit breaker forced");
        self.breaker = Some((until, reason));
    }

    /// Evaluate the gate for this tick.
    ///
    /// `daily_net_pnl` is the trailing-day realised + unrealised PnL net of
    /// fees; `position_usd` is the signed inventory notional.
    pub fn evaluate(
        &mut self,
        now_ms: u64,
        daily_net_pnl: Decimal,
        position_usd: Decimal,
    ) -> RiskState {
        // An armed breaker only releases by clock advance.
        if let Some((until, reason)) = self.breaker {
            if now_ms < until {
                return RiskState::CircuitBreak {
                    until_ms: until,
                    reason,
                };
            }
            self.breaker = None;
        }

        let loss_limit = self.limits.max_daily_loss * self.capital_usd;
        if daily_net_pnl <= -loss_limit {
            let until = next_utc_day_ms(now_ms);
            warn!(
                pnl = %daily_net_pnl,
                limit = %loss_limit,
                until_ms = until,
                "daily loss limit hit, halting until next UTC day"
            );
            self.breaker = Some((until, BreakReason::DailyLoss));
            return RiskState::CircuitBreak {
                until_ms: until,
                reason: BreakReason::DailyLoss,
            };
        }

        let error_weight: f64 = self
            .errors
            .iter()
            .filter(|(ts, _)| now_ms.saturating_sub(*ts) <= ERROR_WINDOW_MS)
            .map(|(_, w)| w)
            .sum();
        if error_weight >= self.limits.api_error_threshold {
            let until = now_ms + self.limits.cooldown_seconds * 1000;
            warn!(
                error_weight,
                threshold = self.limits.api_error_threshold,
                until_ms = until,
                "api error budget exhausted, cooling down"
            );
            self.errors.clear();
            self.breaker = Some((until, BreakReason::ErrorBudget));
            return RiskState::CircuitBreak {
                until_ms: until,
                reason: BreakReason::ErrorBudget,
            };
        }

        if position_usd.abs() >= self.limits.max_position_usd {
            let masked = if position_usd.is_sign_positive() {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            return RiskState::PositionLimit { masked };
        }

        RiskState::Safe
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Apply an allocator max-position multiplier without touching the
    /// other limits.
    pub fn set_max_position_usd(&mut self, max_position_usd: Decimal) {
        self.limits.max_position_usd = max_position_usd;
    }

    pub fn set_capital(&mut self, capital_usd: Decimal) {
        self.capital_usd = capital_usd;
    }
}

/// Milliseconds of the next UTC midnight strictly after `now_ms`.
fn next_utc_day_ms(now_ms: u64) -> u64 {
    let now = DateTime::<Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_else(Utc::now);
    let next = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .expect("date overflow")
        .and_hms_opt(0, 0, 0)
        .expect("valid midnight")
        .and_utc();
    next.timestamp_millis() as u64
}
