// ===============================
// src/domain.rs
// ===============================

use std::collections::VecDeque;

use chrono::Utc;

pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side { Buy, Sell }
impl Side {
    pub fn sign(&self) -> f64 { match self { Side::Buy => 1.0, Side::Sell => -1.0 } }
    pub fn is_buy(&self) -> bool { matches!(self, Side::Buy) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus { New, Filled, Cancelled, Rejected }

/// Top-of-book update for one symbol. Immutable once published.
#[derive(Debug, Clone)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub ts_ns: i64,
}

impl Quote {
    pub fn mid(&self) -> f64 { (self.bid + self.ask) / 2.0 }

    /// Invariant: bid <= ask, everything non-negative and finite.
    pub fn is_valid(&self) -> bool {
        self.bid.is_finite()
            && self.ask.is_finite()
            && self.bid >= 0.0
            && self.ask >= 0.0
            && self.bid <= self.ask
            && self.bid_size >= 0.0
            && self.ask_size >= 0.0
    }
}

/// An execution done on our behalf, reported back by the venue.
#[derive(Debug, Clone)]
pub struct Trade {
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub ts_ns: i64,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
    pub ts_ns: i64,
    pub status: OrderStatus,
}

/// Per-symbol quoting knobs. `levels >= 1`, `tick_size > 0`, `0 < spread_pct < 1`.
#[derive(Debug, Clone)]
pub struct MakerParams {
    pub spread_pct: f64,
    pub base_size: f64,
    pub skew_factor: f64,
    pub tick_size: f64,
    pub levels: usize,
    pub level_spacing: f64,
}

/// Hard per-symbol ceilings. Any breached check rejects the order.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_gross_position: f64,
    pub max_net_position: f64,
    pub max_dollar_exposure: f64,
    pub var_limit: f64,
    pub es_limit: f64,
    pub max_drawdown_limit: f64,
    pub max_position_duration_ns: i64,
    pub max_order_size: f64,
    pub max_daily_loss: f64,
    pub max_daily_trades: u64,
}

// Inventory structures
#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    /// Signed quantity: long positive, short negative.
    pub position: f64,
    /// Value-weighted entry price of the open position. None while flat.
    pub vwap: Option<f64>,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// FIFO ring of the most recent fills, capped at `risk::RECENT_TRADES_CAP`.
    pub recent_trades: VecDeque<Trade>,
    pub last_update: i64,
    /// When the current non-flat position was opened; 0 while flat.
    pub opened_ts: i64,
    /// Fills applied over this process run (the trading day).
    pub trade_count: u64,
    /// High-water mark of realized + unrealized PnL, for drawdown gating.
    pub peak_pnl: f64,
}

impl PositionTracker {
    pub fn is_flat(&self) -> bool { self.position.abs() < f64::EPSILON }
    pub fn total_pnl(&self) -> f64 { self.realized_pnl + self.unrealized_pnl }
}
