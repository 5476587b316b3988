// ===============================
// src/maker.rs
// ===============================
//
// Per-symbol ladder quoting. On every market update the maker cancels its
// outstanding orders for the symbol, recomputes a multi-level ladder around
// the mid with inventory-aware skew, and resubmits through the order
// manager. Unconfigured symbols are skipped silently; degenerate arithmetic
// suppresses the whole update rather than emitting a bad price.

use ahash::AHashMap as HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::domain::{MakerParams, Order, OrderStatus, Quote, Side};
use crate::metrics;
use crate::ordermgr::OrderManager;
use crate::risk::RiskEngine;
use crate::vol::VolatilityEstimator;

static ORDER_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_order_id() -> String {
    format!("MM_{}", ORDER_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Snap a price to the venue grid, half away from zero.
pub fn round_to_tick(px: f64, tick: f64) -> f64 {
    (px / tick).round() * tick
}

#[derive(Debug, Error)]
pub enum MakerError {
    #[error("invalid maker parameters: {0}")]
    InvalidParams(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct LadderLevel {
    pub bid: f64,
    pub ask: f64,
    pub size: f64,
}

/// Build the ladder for one update. None means the inputs were degenerate
/// and nothing should be quoted.
pub(crate) fn compute_ladder(
    params: &MakerParams,
    mid: f64,
    sigma: f64,
    inventory_ratio: f64,
) -> Option<Vec<LadderLevel>> {
    if !mid.is_finite() || mid <= 0.0 || !sigma.is_finite() || !inventory_ratio.is_finite() {
        return None;
    }
    let adjusted_spread = params.spread_pct * (1.0 + inventory_ratio * params.skew_factor * sigma);
    // long inventory pushes both sides down, biasing flow toward mean reversion
    let skew = inventory_ratio * params.skew_factor;
    if !adjusted_spread.is_finite() || !skew.is_finite() {
        return None;
    }

    let mut levels = Vec::with_capacity(params.levels);
    for l in 0..params.levels {
        let mult = 1.0 + l as f64 * params.level_spacing;
        let bid = round_to_tick(mid * (1.0 - adjusted_spread * mult - skew), params.tick_size);
        let ask = round_to_tick(mid * (1.0 + adjusted_spread * mult - skew), params.tick_size);
        let size = params.base_size / 2f64.powi(l as i32);
        if !bid.is_finite() || !ask.is_finite() || bid <= 0.0 || size <= 0.0 {
            return None;
        }
        levels.push(LadderLevel { bid, ask, size });
    }
    Some(levels)
}

#[derive(Default)]
struct MakerBook {
    params: HashMap<String, MakerParams>,
    vols: HashMap<String, VolatilityEstimator>,
    active: HashMap<String, Vec<String>>,
}

pub struct MarketMaker {
    inner: Mutex<MakerBook>,
    risk: Arc<RiskEngine>,
    orders: Arc<OrderManager>,
    vol_window: usize,
    suppressed: AtomicU64,
}

impl MarketMaker {
    pub fn new(risk: Arc<RiskEngine>, orders: Arc<OrderManager>, vol_window: usize) -> Self {
        Self {
            inner: Mutex::new(MakerBook::default()),
            risk,
            orders,
            vol_window,
            suppressed: AtomicU64::new(0),
        }
    }

    pub fn configure_symbol(&self, symbol: &str, params: MakerParams) -> Result<(), MakerError> {
        if !(params.tick_size > 0.0) || !params.tick_size.is_finite() {
            return Err(MakerError::InvalidParams("tick_size must be positive"));
        }
        if params.levels < 1 {
            return Err(MakerError::InvalidParams("levels must be at least 1"));
        }
        if !(params.spread_pct > 0.0 && params.spread_pct < 1.0) {
            return Err(MakerError::InvalidParams("spread_pct must be in (0, 1)"));
        }
        if !(params.base_size > 0.0) || !params.base_size.is_finite() {
            return Err(MakerError::InvalidParams("base_size must be positive"));
        }
        if !params.skew_factor.is_finite() || !params.level_spacing.is_finite()
            || params.level_spacing < 0.0
        {
            return Err(MakerError::InvalidParams("bad skew or level spacing"));
        }

        let mut book = self.inner.lock().expect("maker lock poisoned");
        let window = self.vol_window;
        book.vols
            .entry(symbol.to_string())
            .or_insert_with(|| VolatilityEstimator::new(window));
        book.params.insert(symbol.to_string(), params);
        info!(symbol = %symbol, "maker configured");
        Ok(())
    }

    pub fn active_orders(&self, symbol: &str) -> Vec<String> {
        self.inner
            .lock()
            .expect("maker lock poisoned")
            .active
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Re-quote one symbol from a fresh top-of-book. Called from the single
    /// market-data consumer, which serializes updates; the internal lock only
    /// covers staging so it is never held across an order-manager call.
    pub fn update_quotes(&self, symbol: &str, quote: &Quote) {
        enum Staged {
            Skip,
            Suppress,
            Requote {
                ladder: Vec<LadderLevel>,
                cancels: Vec<String>,
            },
        }

        let position = self.risk.position(symbol);

        let staged = {
            let mut guard = self.inner.lock().expect("maker lock poisoned");
            let book = &mut *guard;
            match book.params.get(symbol) {
                None => Staged::Skip, // not ours to quote
                Some(params) => {
                    let mid = quote.mid();
                    if !mid.is_finite() || mid <= 0.0 {
                        Staged::Suppress
                    } else {
                        let window = self.vol_window;
                        let est = book
                            .vols
                            .entry(symbol.to_string())
                            .or_insert_with(|| VolatilityEstimator::new(window));
                        est.update(mid);
                        let sigma = est.volatility();
                        let inventory_ratio = position / params.base_size;
                        match compute_ladder(params, mid, sigma, inventory_ratio) {
                            None => Staged::Suppress,
                            Some(ladder) => Staged::Requote {
                                ladder,
                                cancels: book.active.remove(symbol).unwrap_or_default(),
                            },
                        }
                    }
                }
            }
        };

        let (ladder, cancels) = match staged {
            Staged::Skip => return,
            Staged::Suppress => {
                self.suppressed.fetch_add(1, Ordering::Relaxed);
                metrics::QUOTES_SUPPRESSED.inc();
                return;
            }
            Staged::Requote { ladder, cancels } => (ladder, cancels),
        };

        for id in &cancels {
            self.orders.cancel_order(id);
        }

        let mut placed = Vec::with_capacity(ladder.len() * 2);
        for level in &ladder {
            for (side, price) in [(Side::Buy, level.bid), (Side::Sell, level.ask)] {
                let order = Order {
                    order_id: next_order_id(),
                    symbol: symbol.to_string(),
                    price,
                    quantity: level.size,
                    side,
                    ts_ns: quote.ts_ns,
                    status: OrderStatus::New,
                };
                let id = order.order_id.clone();
                if self.orders.submit_order(order).is_ok() {
                    placed.push(id);
                }
            }
        }

        if !placed.is_empty() {
            let mut book = self.inner.lock().expect("maker lock poisoned");
            book.active.entry(symbol.to_string()).or_default().extend(placed);
        }
    }
}
