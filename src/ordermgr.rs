// ===============================
// src/ordermgr.rs
// ===============================
//
// Order manager: the single hand-off between strategy and venue. Accepted
// orders go through the bounded order ring to the routing worker, which
// forwards them to the execution boundary. Enqueue failures are surfaced to
// the caller, never retried, so no order can be executed twice.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use crate::domain::Order;
use crate::gateway::ExecutionSink;
use crate::metrics;
use crate::queue::{spsc, Consumer, Producer};
use crate::risk::RiskEngine;

const SPIN_LIMIT: u32 = 64;
const POLL_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("rejected by pre-trade risk")]
    Rejected,
    #[error("order ring full")]
    QueueFull,
}

pub struct OrderManager {
    tx: Mutex<Producer<Order>>,
    rx_slot: Mutex<Option<Consumer<Order>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    risk: Arc<RiskEngine>,
    sink: Arc<dyn ExecutionSink>,
    rejected: AtomicU64,
    dropped: AtomicU64,
    cancels: AtomicU64,
    forwarded: Arc<AtomicU64>,
}

impl OrderManager {
    pub fn new(capacity: usize, risk: Arc<RiskEngine>, sink: Arc<dyn ExecutionSink>) -> Self {
        let (tx, rx) = spsc(capacity);
        Self {
            tx: Mutex::new(tx),
            rx_slot: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            risk,
            sink,
            rejected: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            cancels: AtomicU64::new(0),
            forwarded: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Risk-gate the order and enqueue it for the routing worker.
    /// A no-op once shutdown has been observed.
    pub fn submit_order(&self, order: Order) -> Result<(), SubmitError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.risk.check_order(&order) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            metrics::ORDERS_REJECTED.inc();
            return Err(SubmitError::Rejected);
        }
        match self.tx.lock().expect("order tx lock poisoned").push(order) {
            Ok(()) => {
                metrics::ORDERS.inc();
                Ok(())
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::ORDERS_DROPPED.inc();
                Err(SubmitError::QueueFull)
            }
        }
    }

    /// Record the cancel request and pass it to the boundary, which owns
    /// actually carrying it out.
    pub fn cancel_order(&self, order_id: &str) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        self.cancels.fetch_add(1, Ordering::Relaxed);
        metrics::CANCELS.inc();
        self.sink.cancel(order_id);
    }

    pub fn start(&self) -> std::io::Result<()> {
        let Some(mut rx) = self.rx_slot.lock().expect("order rx lock poisoned").take() else {
            return Ok(()); // already started
        };
        let shutdown = self.shutdown.clone();
        let sink = self.sink.clone();
        let forwarded = self.forwarded.clone();

        let handle = thread::Builder::new().name("order-mgr".into()).spawn(move || {
            let mut idle: u32 = 0;
            while !shutdown.load(Ordering::Acquire) {
                match rx.pop() {
                    Some(order) => {
                        idle = 0;
                        sink.send(&order);
                        forwarded.fetch_add(1, Ordering::Relaxed);
                        metrics::ORDERS_FORWARDED.inc();
                    }
                    None => {
                        if idle < SPIN_LIMIT {
                            idle += 1;
                            std::hint::spin_loop();
                        } else {
                            thread::sleep(POLL_SLEEP);
                        }
                    }
                }
            }
        })?;
        *self.worker.lock().expect("order worker lock poisoned") = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().expect("order worker lock poisoned").take() {
            let _ = handle.join();
        }
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn cancels(&self) -> u64 {
        self.cancels.load(Ordering::Relaxed)
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderStatus, RiskLimits, Side};
    use crate::gateway::testkit::RecordingSink;
    use std::time::Instant;

    fn permissive_limits() -> RiskLimits {
        RiskLimits {
            max_gross_position: 1e12,
            max_net_position: 1e12,
            max_dollar_exposure: 1e15,
            var_limit: 1e12,
            es_limit: 1e12,
            max_drawdown_limit: 1e12,
            max_position_duration_ns: 0,
            max_order_size: 1e12,
            max_daily_loss: 1e12,
            max_daily_trades: u64::MAX,
        }
    }

    fn order(symbol: &str, qty: f64) -> Order {
        Order {
            order_id: "MM_1".into(),
            symbol: symbol.into(),
            price: 100.0,
            quantity: qty,
            side: Side::Buy,
            ts_ns: 1,
            status: OrderStatus::New,
        }
    }

    fn wait_until(deadline_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(deadline_ms) {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn accepted_order_reaches_the_sink() {
        let risk = Arc::new(RiskEngine::new(16));
        risk.set_risk_limits("AAPL", permissive_limits());
        let sink = Arc::new(RecordingSink::default());
        let mgr = OrderManager::new(64, risk, sink.clone());
        mgr.start().unwrap();

        mgr.submit_order(order("AAPL", 10.0)).unwrap();
        assert!(wait_until(1000, || sink.sent_count() == 1));
        assert_eq!(mgr.forwarded(), 1);
        mgr.stop();
    }

    #[test]
    fn rejected_order_is_counted_not_enqueued() {
        let risk = Arc::new(RiskEngine::new(16)); // no limits: fail closed
        let sink = Arc::new(RecordingSink::default());
        let mgr = OrderManager::new(64, risk, sink.clone());
        mgr.start().unwrap();

        assert_eq!(mgr.submit_order(order("AAPL", 10.0)), Err(SubmitError::Rejected));
        assert_eq!(mgr.rejected(), 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.sent_count(), 0);
        mgr.stop();
    }

    #[test]
    fn full_ring_surfaces_queue_full() {
        let risk = Arc::new(RiskEngine::new(16));
        risk.set_risk_limits("AAPL", permissive_limits());
        let sink = Arc::new(RecordingSink::default());
        // worker not started, so the ring fills up
        let mgr = OrderManager::new(4, risk, sink);
        for _ in 0..4 {
            mgr.submit_order(order("AAPL", 1.0)).unwrap();
        }
        assert_eq!(mgr.submit_order(order("AAPL", 1.0)), Err(SubmitError::QueueFull));
        assert_eq!(mgr.dropped(), 1);
    }

    #[test]
    fn cancel_forwards_to_sink() {
        let risk = Arc::new(RiskEngine::new(16));
        let sink = Arc::new(RecordingSink::default());
        let mgr = OrderManager::new(64, risk, sink.clone());
        mgr.cancel_order("MM_42");
        assert_eq!(mgr.cancels(), 1);
        assert_eq!(sink.cancelled.lock().unwrap().as_slice(), &["MM_42".to_string()]);
    }

    #[test]
    fn submit_after_stop_is_a_noop() {
        let risk = Arc::new(RiskEngine::new(16));
        risk.set_risk_limits("AAPL", permissive_limits());
        let sink = Arc::new(RecordingSink::default());
        let mgr = OrderManager::new(64, risk, sink.clone());
        mgr.start().unwrap();
        mgr.stop();
        mgr.stop(); // idempotent

        assert_eq!(mgr.submit_order(order("AAPL", 1.0)), Ok(()));
        mgr.cancel_order("MM_1");
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.sent_count(), 0);
        assert_eq!(sink.cancelled_count(), 0);
    }
}
