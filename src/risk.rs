// ===============================
// src/risk.rs
// ===============================
//
// Pre-trade checks and post-trade bookkeeping. One coarse mutex guards the
// limits, trackers and per-symbol estimators; every public operation takes
// it, which is acceptable because pre-trade checks sit off the wire-receive
// path. Unknown symbols are fail-closed: no limits, no orders.

use ahash::AHashMap as HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

use crate::domain::{Order, PositionTracker, RiskLimits, Trade};
use crate::metrics::{FILLS, INV_QTY, PNL_REALIZED, PNL_UNREALIZED};
use crate::vol::VolatilityEstimator;

/// One-sided 95% z-score used by the parametric VaR gate.
pub const Z_95: f64 = 1.645;
/// Expected shortfall approximated as a flat multiple of VaR.
pub const ES_FACTOR: f64 = 1.2;
/// Bound on the per-symbol ring of recent fills.
pub const RECENT_TRADES_CAP: usize = 1000;

const FLAT_EPS: f64 = 1e-9;

/// Parametric one-sided VaR under the log-normal return assumption.
pub fn parametric_var(position: f64, sigma: f64) -> f64 {
    position.abs() * sigma * Z_95
}

pub fn expected_shortfall(var: f64) -> f64 {
    ES_FACTOR * var
}

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("no limits configured")]
    NoLimits,
    #[error("order size above limit")]
    OrderSize,
    #[error("net position limit")]
    NetPosition,
    #[error("gross position limit")]
    GrossPosition,
    #[error("dollar exposure limit")]
    DollarExposure,
    #[error("VaR limit")]
    ValueAtRisk,
    #[error("expected shortfall limit")]
    ExpectedShortfall,
    #[error("daily loss limit")]
    DailyLoss,
    #[error("daily trade limit")]
    DailyTrades,
    #[error("drawdown limit")]
    Drawdown,
    #[error("position held past duration limit")]
    PositionDuration,
}

#[derive(Default)]
struct RiskBook {
    limits: HashMap<String, RiskLimits>,
    trackers: HashMap<String, PositionTracker>,
    vols: HashMap<String, VolatilityEstimator>,
}

pub struct RiskEngine {
    inner: Mutex<RiskBook>,
    vol_window: usize,
    fills: AtomicU64,
}

impl RiskEngine {
    pub fn new(vol_window: usize) -> Self {
        Self {
            inner: Mutex::new(RiskBook::default()),
            vol_window,
            fills: AtomicU64::new(0),
        }
    }

    pub fn set_risk_limits(&self, symbol: &str, limits: RiskLimits) {
        let mut book = self.inner.lock().expect("risk lock poisoned");
        book.limits.insert(symbol.to_string(), limits);
    }

    pub fn position(&self, symbol: &str) -> f64 {
        let book = self.inner.lock().expect("risk lock poisoned");
        book.trackers.get(symbol).map(|t| t.position).unwrap_or(0.0)
    }

    pub fn tracker(&self, symbol: &str) -> Option<PositionTracker> {
        let book = self.inner.lock().expect("risk lock poisoned");
        book.trackers.get(symbol).cloned()
    }

    pub fn fills(&self) -> u64 {
        self.fills.load(Ordering::Relaxed)
    }

    /// Synchronous pre-trade gate; callable from any thread.
    pub fn check_order(&self, order: &Order) -> bool {
        match self.evaluate(order) {
            Ok(()) => true,
            Err(reason) => {
                warn!(
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    qty = order.quantity,
                    %reason,
                    "risk rejected"
                );
                false
            }
        }
    }

    fn evaluate(&self, order: &Order) -> Result<(), RiskError> {
        let book = self.inner.lock().expect("risk lock poisoned");
        let limits = book.limits.get(&order.symbol).ok_or(RiskError::NoLimits)?;

        if order.quantity > limits.max_order_size {
            return Err(RiskError::OrderSize);
        }

        let tracker = book.trackers.get(&order.symbol);
        let position = tracker.map(|t| t.position).unwrap_or(0.0);
        let after = position + order.side.sign() * order.quantity;

        if after.abs() > limits.max_net_position {
            return Err(RiskError::NetPosition);
        }
        // Gross counts working exposure regardless of direction.
        if position.abs() + order.quantity > limits.max_gross_position {
            return Err(RiskError::GrossPosition);
        }
        if after.abs() * order.price > limits.max_dollar_exposure {
            return Err(RiskError::DollarExposure);
        }

        let sigma = book
            .vols
            .get(&order.symbol)
            .map(|v| v.volatility())
            .unwrap_or(0.0);
        let var = parametric_var(after, sigma);
        if var > limits.var_limit {
            return Err(RiskError::ValueAtRisk);
        }
        if expected_shortfall(var) > limits.es_limit {
            return Err(RiskError::ExpectedShortfall);
        }

        if let Some(t) = tracker {
            if t.realized_pnl < -limits.max_daily_loss {
                return Err(RiskError::DailyLoss);
            }
            if t.trade_count >= limits.max_daily_trades {
                return Err(RiskError::DailyTrades);
            }
            if t.peak_pnl - t.total_pnl() > limits.max_drawdown_limit {
                return Err(RiskError::Drawdown);
            }
            // A stale position may only be reduced, not grown.
            if limits.max_position_duration_ns > 0
                && t.opened_ts > 0
                && after.abs() > position.abs()
                && order.ts_ns.saturating_sub(t.opened_ts) > limits.max_position_duration_ns
            {
                return Err(RiskError::PositionDuration);
            }
        }

        Ok(())
    }

    /// Apply a fill: signed position, VWAP across side changes, realized and
    /// unrealized PnL, the bounded recent-trades ring, and the symbol's own
    /// volatility estimator.
    pub fn update_position(&self, symbol: &str, trade: &Trade) {
        let mut guard = self.inner.lock().expect("risk lock poisoned");
        let book = &mut *guard;

        let window = self.vol_window;
        book.vols
            .entry(symbol.to_string())
            .or_insert_with(|| VolatilityEstimator::new(window))
            .update(trade.price);

        let tracker = book.trackers.entry(symbol.to_string()).or_default();
        apply_fill(tracker, trade);

        if let Some(limits) = book.limits.get(symbol) {
            if limits.max_position_duration_ns > 0
                && tracker.opened_ts > 0
                && trade.ts_ns.saturating_sub(tracker.opened_ts) > limits.max_position_duration_ns
            {
                warn!(symbol = %symbol, position = tracker.position, "position held past duration limit");
            }
        }

        self.fills.fetch_add(1, Ordering::Relaxed);
        FILLS.inc();
        INV_QTY.with_label_values(&[symbol]).set(tracker.position);
        PNL_REALIZED.with_label_values(&[symbol]).set(tracker.realized_pnl);
        PNL_UNREALIZED
            .with_label_values(&[symbol])
            .set(tracker.unrealized_pnl);
    }

    #[cfg(test)]
    pub(crate) fn seed_prices(&self, symbol: &str, prices: &[f64]) {
        let mut book = self.inner.lock().expect("risk lock poisoned");
        let window = self.vol_window;
        let est = book
            .vols
            .entry(symbol.to_string())
            .or_insert_with(|| VolatilityEstimator::new(window));
        for p in prices {
            est.update(*p);
        }
    }
}

fn apply_fill(tracker: &mut PositionTracker, trade: &Trade) {
    let prev = tracker.position;
    let signed = trade.side.sign() * trade.quantity;
    let new = prev + signed;

    if prev.abs() < FLAT_EPS {
        // opening trade seeds the entry price
        tracker.vwap = Some(trade.price);
    } else if prev * signed > 0.0 {
        // same-side add: value-weighted entry
        let vwap = tracker.vwap.unwrap_or(trade.price);
        tracker.vwap = Some(
            (vwap * prev.abs() + trade.price * trade.quantity) / (prev.abs() + trade.quantity),
        );
    } else if new.abs() < FLAT_EPS || prev * new > 0.0 {
        // reduction: entry price unchanged, the closed slice realizes
        let closed = trade.quantity.min(prev.abs());
        if let Some(vwap) = tracker.vwap {
            tracker.realized_pnl += (trade.price - vwap) * closed * prev.signum();
        }
    } else {
        // crossing zero: close the old side, reopen the residual at the fill price
        if let Some(vwap) = tracker.vwap {
            tracker.realized_pnl += (trade.price - vwap) * prev.abs() * prev.signum();
        }
        tracker.vwap = Some(trade.price);
    }

    tracker.position = if new.abs() < FLAT_EPS { 0.0 } else { new };
    if tracker.position == 0.0 {
        tracker.vwap = None;
        tracker.opened_ts = 0;
    } else if prev.abs() < FLAT_EPS {
        tracker.opened_ts = trade.ts_ns;
    }

    tracker.unrealized_pnl = match tracker.vwap {
        Some(vwap) if tracker.position != 0.0 => (trade.price - vwap) * tracker.position,
        _ => 0.0,
    };

    tracker.recent_trades.push_back(trade.clone());
    if tracker.recent_trades.len() > RECENT_TRADES_CAP {
        tracker.recent_trades.pop_front();
    }
    tracker.trade_count += 1;
    tracker.last_update = trade.ts_ns;

    let total = tracker.total_pnl();
    if total > tracker.peak_pnl {
        tracker.peak_pnl = total;
    }
}
