// ===============================
// src/gateway.rs
// ===============================
//
// Execution boundary. The engine only ever talks to an ExecutionSink; the
// real venue adapter lives outside this process. The mock below acks every
// order and flips a coin to synthesize an immediate fill back into the risk
// engine, which is enough to drive positions and PnL in a demo run.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{now_ns, Order, Trade};
use crate::risk::RiskEngine;

/// Boundary to the venue. Both calls must return promptly; delivery is
/// at-most-once with reconciliation assumed downstream.
pub trait ExecutionSink: Send + Sync {
    fn send(&self, order: &Order);
    fn cancel(&self, order_id: &str);
}

pub struct MockGateway {
    risk: Arc<RiskEngine>,
    fill_ratio: f64,
    sent: AtomicU64,
    cancelled: AtomicU64,
}

impl MockGateway {
    pub fn new(risk: Arc<RiskEngine>, fill_ratio: f64) -> Self {
        Self {
            risk,
            fill_ratio: fill_ratio.clamp(0.0, 1.0),
            sent: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl ExecutionSink for MockGateway {
    fn send(&self, order: &Order) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(order_id = %order.order_id, symbol = %order.symbol, px = order.price, qty = order.quantity, "venue ack");

        if self.fill_ratio >= 1.0 || rand::thread_rng().gen::<f64>() < self.fill_ratio {
            let trade = Trade {
                symbol: order.symbol.clone(),
                price: order.price,
                quantity: order.quantity,
                side: order.side,
                ts_ns: now_ns(),
            };
            self.risk.update_position(&order.symbol, &trade);
            debug!(order_id = %order.order_id, "venue fill");
        }
    }

    fn cancel(&self, order_id: &str) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(order_id = %order_id, "venue cancel");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, Side};

    fn order(symbol: &str, qty: f64, price: f64) -> Order {
        Order {
            order_id: "MM_1".into(),
            symbol: symbol.into(),
            price,
            quantity: qty,
            side: Side::Buy,
            ts_ns: 1,
            status: OrderStatus::New,
        }
    }

    #[test]
    fn full_fill_ratio_updates_positions() {
        let risk = Arc::new(RiskEngine::new(16));
        let gw = MockGateway::new(risk.clone(), 1.0);
        gw.send(&order("AAPL", 10.0, 100.0));
        assert_eq!(gw.sent(), 1);
        assert_eq!(risk.fills(), 1);
        assert_eq!(risk.position("AAPL"), 10.0);
    }

    #[test]
    fn zero_fill_ratio_never_fills() {
        let risk = Arc::new(RiskEngine::new(16));
        let gw = MockGateway::new(risk.clone(), 0.0);
        for _ in 0..50 {
            gw.send(&order("AAPL", 10.0, 100.0));
        }
        assert_eq!(gw.sent(), 50);
        assert_eq!(risk.fills(), 0);
        assert_eq!(risk.position("AAPL"), 0.0);
    }

    #[test]
    fn cancel_only_counts() {
        let risk = Arc::new(RiskEngine::new(16));
        let gw = MockGateway::new(risk, 1.0);
        gw.cancel("MM_7");
        assert_eq!(gw.cancelled(), 1);
        assert_eq!(gw.sent(), 0);
    }
}
