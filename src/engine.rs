// ===============================
// src/engine.rs
// ===============================
//
// Lifecycle supervisor: owns the component graph and the worker threads.
// Construction wires risk -> order manager -> maker -> market-data handler
// and hands back the quote ingress for whatever feed drives the engine.
// start/stop are idempotent; stop joins every worker.

use std::sync::Arc;
use tracing::info;

use crate::book::BookRegistry;
use crate::domain::{MakerParams, RiskLimits};
use crate::gateway::ExecutionSink;
use crate::maker::{MakerError, MarketMaker};
use crate::md::{MarketDataHandler, QuoteIngress};
use crate::ordermgr::OrderManager;
use crate::risk::RiskEngine;

pub struct TradingEngine {
    books: Arc<BookRegistry>,
    risk: Arc<RiskEngine>,
    maker: Arc<MarketMaker>,
    orders: Arc<OrderManager>,
    md: MarketDataHandler,
    maker_defaults: MakerParams,
    limit_defaults: RiskLimits,
}

impl TradingEngine {
    pub fn new(
        queue_capacity: usize,
        vol_window: usize,
        maker_defaults: MakerParams,
        limit_defaults: RiskLimits,
        risk: Arc<RiskEngine>,
        sink: Arc<dyn ExecutionSink>,
    ) -> (Self, QuoteIngress) {
        let books = Arc::new(BookRegistry::new());
        let orders = Arc::new(OrderManager::new(queue_capacity, risk.clone(), sink));
        let maker = Arc::new(MarketMaker::new(risk.clone(), orders.clone(), vol_window));
        let (md, ingress) = MarketDataHandler::new(queue_capacity, books.clone(), maker.clone());

        let engine = Self {
            books,
            risk,
            maker,
            orders,
            md,
            maker_defaults,
            limit_defaults,
        };
        (engine, ingress)
    }

    /// Attach a quoting strategy for a symbol: installs the configured
    /// maker parameters and risk limits. Call before `start`.
    pub fn add_strategy(&self, symbol: &str) -> Result<(), MakerError> {
        self.risk.set_risk_limits(symbol, self.limit_defaults.clone());
        self.maker.configure_symbol(symbol, self.maker_defaults.clone())?;
        info!(symbol = %symbol, "strategy attached");
        Ok(())
    }

    pub fn start(&self) -> std::io::Result<()> {
        self.md.start()?;
        self.orders.start()?;
        info!("engine started");
        Ok(())
    }

    /// Signal shutdown and join all workers. Safe to call more than once;
    /// anything submitted afterwards is a no-op.
    pub fn stop(&self) {
        self.md.stop();
        self.orders.stop();
        info!("engine stopped");
    }

    pub fn books(&self) -> &Arc<BookRegistry> {
        &self.books
    }

    pub fn maker(&self) -> &Arc<MarketMaker> {
        &self.maker
    }

    pub fn orders(&self) -> &Arc<OrderManager> {
        &self.orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{now_ns, Order, OrderStatus, Quote, Side};
    use crate::gateway::testkit::RecordingSink;
    use std::thread;
    use std::time::{Duration, Instant};

    fn maker_params(levels: usize) -> MakerParams {
        MakerParams {
            spread_pct: 0.001,
            base_size: 10.0,
            skew_factor: 0.2,
            tick_size: 0.01,
            levels,
            level_spacing: 0.5,
        }
    }

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

    fn quote(symbol: &str, px: f64) -> Quote {
        Quote {
            symbol: symbol.into(),
            bid: px - 0.01,
            ask: px + 0.01,
            bid_size: 100.0,
            ask_size: 100.0,
            ts_ns: now_ns(),
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
    fn quote_flows_through_to_the_boundary() {
        let risk = Arc::new(RiskEngine::new(16));
        let sink = Arc::new(RecordingSink::default());
        let (engine, mut ingress) = TradingEngine::new(
            64,
            16,
            maker_params(1),
            permissive_limits(),
            risk,
            sink.clone(),
        );
        engine.add_strategy("AAPL").unwrap();
        engine.start().unwrap();

        ingress.on_quote(quote("AAPL", 100.0));
        assert!(wait_until(1000, || sink.sent_count() == 2)); // one level, both sides
        assert!(engine.books().top("AAPL").is_some());
        assert_eq!(engine.maker().active_orders("AAPL").len(), 2);

        let sent = sink.sent.lock().unwrap().clone();
        let bid = sent.iter().find(|o| o.side == Side::Buy).unwrap();
        let ask = sent.iter().find(|o| o.side == Side::Sell).unwrap();
        assert!((bid.price - 99.90).abs() < 1e-9);
        assert!((ask.price - 100.10).abs() < 1e-9);

        engine.stop();
    }

    #[test]
    fn unknown_symbol_is_inert() {
        let risk = Arc::new(RiskEngine::new(16));
        let sink = Arc::new(RecordingSink::default());
        let (engine, mut ingress) = TradingEngine::new(
            64,
            16,
            maker_params(1),
            permissive_limits(),
            risk,
            sink.clone(),
        );
        engine.add_strategy("AAPL").unwrap();
        engine.start().unwrap();

        ingress.on_quote(quote("TSLA", 200.0));
        assert!(wait_until(1000, || engine.books().top("TSLA").is_some()));
        thread::sleep(Duration::from_millis(20));
        // book updated, but no quoting and fail-closed risk
        assert_eq!(sink.sent_count(), 0);
        assert!(engine.maker().active_orders("TSLA").is_empty());

        engine.stop();
    }

    #[test]
    fn graceful_shutdown_under_load() {
        // 10k quotes across two symbols, then stop: workers must join
        // promptly and nothing may reach the queue afterwards.
        let risk = Arc::new(RiskEngine::new(16));
        let sink = Arc::new(RecordingSink::default());
        let (engine, mut ingress) = TradingEngine::new(
            16_384,
            16,
            maker_params(1),
            permissive_limits(),
            risk,
            sink.clone(),
        );
        engine.add_strategy("AAPL").unwrap();
        engine.add_strategy("GOOGL").unwrap();
        engine.start().unwrap();

        for i in 0..10_000u32 {
            let symbol = if i % 2 == 0 { "AAPL" } else { "GOOGL" };
            let px = 100.0 + (i % 50) as f64 * 0.01;
            ingress.on_quote(quote(symbol, px));
        }

        thread::sleep(Duration::from_millis(50));
        let t0 = Instant::now();
        engine.stop();
        assert!(
            t0.elapsed() < Duration::from_millis(500),
            "workers must join promptly"
        );

        let forwarded = engine.orders().forwarded();
        let order = Order {
            order_id: "MM_0".into(),
            symbol: "AAPL".into(),
            price: 100.0,
            quantity: 1.0,
            side: Side::Buy,
            ts_ns: now_ns(),
            status: OrderStatus::New,
        };
        assert_eq!(engine.orders().submit_order(order), Ok(()));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.orders().forwarded(), forwarded);

        assert!(engine.books().top("AAPL").is_some());
        assert!(engine.books().top("GOOGL").is_some());

        engine.stop(); // idempotent
    }
}
