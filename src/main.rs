// ===============================
// src/main.rs
// ===============================
//
// In-process market-making engine: a mock feed pushes quotes into the
// market-data handler, the maker re-quotes a ladder per symbol, orders pass
// the risk engine and flow to the execution boundary, and fills come back
// into positions. Prometheus metrics on METRICS_PORT, structured logs via
// RUST_LOG.

mod book;
mod config;
mod domain;
mod engine;
mod feed;
mod gateway;
mod maker;
mod md;
mod metrics;
mod ordermgr;
mod queue;
mod risk;
mod vol;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::engine::TradingEngine;
use crate::gateway::{ExecutionSink, MockGateway};
use crate::risk::RiskEngine;

fn main() -> ExitCode {
    // ---- Logging ----
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    // ---- Load config & limits ----
    let (args, maker_params, limits) = config::load();

    // ---- Metrics ----
    metrics::init();
    if args.metrics_port != 0 {
        if let Err(e) = metrics::serve(args.metrics_port) {
            error!(?e, port = args.metrics_port, "metrics bind failed");
            return ExitCode::FAILURE;
        }
    }

    info!(
        symbols = ?args.symbols,
        queue_capacity = args.queue_capacity,
        vol_window = args.vol_window,
        fill_ratio = args.fill_ratio,
        "startup config"
    );

    // ---- Wiring ----
    let risk = Arc::new(RiskEngine::new(args.vol_window));
    let gateway = Arc::new(MockGateway::new(risk.clone(), args.fill_ratio));
    let sink: Arc<dyn ExecutionSink> = gateway.clone();
    let (engine, ingress) = TradingEngine::new(
        args.queue_capacity,
        args.vol_window,
        maker_params,
        limits,
        risk.clone(),
        sink,
    );

    for symbol in &args.symbols {
        if let Err(e) = engine.add_strategy(symbol) {
            error!(?e, symbol = %symbol, "strategy config rejected");
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = engine.start() {
        error!(?e, "engine start failed");
        return ExitCode::FAILURE;
    }

    // ---- Mock market data ----
    let feed = match feed::MockFeed::spawn(
        ingress,
        args.symbols.clone(),
        args.feed_interval_ms,
        args.feed_start_px,
    ) {
        Ok(f) => f,
        Err(e) => {
            error!(?e, "feed spawn failed");
            engine.stop();
            return ExitCode::FAILURE;
        }
    };

    info!("press Enter to stop trading");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);

    feed.stop();
    engine.stop();

    // ---- Shutdown summary ----
    for symbol in &args.symbols {
        if let Some(q) = engine.books().top(symbol) {
            info!(symbol = %symbol, bid = q.bid, ask = q.ask, "last top of book");
        }
        if let Some(t) = risk.tracker(symbol) {
            info!(
                symbol = %symbol,
                position = t.position,
                realized = t.realized_pnl,
                unrealized = t.unrealized_pnl,
                trades = t.trade_count,
                open_orders = engine.maker().active_orders(symbol).len(),
                "final position"
            );
        }
    }
    info!(
        fills = risk.fills(),
        forwarded = engine.orders().forwarded(),
        rejected = engine.orders().rejected(),
        dropped = engine.orders().dropped(),
        cancels = engine.orders().cancels(),
        suppressed = engine.maker().suppressed(),
        venue_acks = gateway.sent(),
        venue_cancels = gateway.cancelled(),
        "clean shutdown"
    );
    ExitCode::SUCCESS
}
