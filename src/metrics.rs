// ===============================
// src/metrics.rs
// ===============================

use once_cell::sync::Lazy;
use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Pipeline counters --------
pub static QUOTES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("quotes_total", "market data quotes accepted at ingress").unwrap());

pub static QUOTES_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "quotes_dropped_total",
        "quotes dropped at ingress (full ring or invalid)",
    )
    .unwrap()
});

pub static QUOTES_SUPPRESSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "quotes_suppressed_total",
        "quote updates where degenerate arithmetic suppressed the ladder",
    )
    .unwrap()
});

pub static ORDERS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_total", "orders accepted by risk and enqueued").unwrap());

pub static ORDERS_REJECTED: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("orders_rejected_total", "orders rejected pre-trade").unwrap());

pub static ORDERS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("orders_dropped_total", "orders dropped on a full order ring").unwrap()
});

pub static ORDERS_FORWARDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "orders_forwarded_total",
        "orders handed to the execution boundary",
    )
    .unwrap()
});

pub static CANCELS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("cancels_total", "cancel requests issued").unwrap());

pub static FILLS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("fills_total", "fills applied to positions").unwrap());

// -------- Inventory & PnL --------
pub static INV_QTY: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("inventory_qty", "net position per symbol"), &["symbol"]).unwrap()
});

pub static PNL_REALIZED: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("pnl_realized", "realized PnL per symbol"),
        &["symbol"],
    )
    .unwrap()
});

pub static PNL_UNREALIZED: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("pnl_unrealized", "unrealized PnL per symbol"),
        &["symbol"],
    )
    .unwrap()
});

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(QUOTES.clone())),
        REGISTRY.register(Box::new(QUOTES_DROPPED.clone())),
        REGISTRY.register(Box::new(QUOTES_SUPPRESSED.clone())),
        REGISTRY.register(Box::new(ORDERS.clone())),
        REGISTRY.register(Box::new(ORDERS_REJECTED.clone())),
        REGISTRY.register(Box::new(ORDERS_DROPPED.clone())),
        REGISTRY.register(Box::new(ORDERS_FORWARDED.clone())),
        REGISTRY.register(Box::new(CANCELS.clone())),
        REGISTRY.register(Box::new(FILLS.clone())),
        REGISTRY.register(Box::new(INV_QTY.clone())),
        REGISTRY.register(Box::new(PNL_REALIZED.clone())),
        REGISTRY.register(Box::new(PNL_UNREALIZED.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics) — tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Bind the scrape endpoint and serve it from a dedicated OS thread.
/// Binding happens on the caller's thread so a bad port is a startup fault.
pub fn serve(port: u16) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    tracing::info!(%addr, "metrics listening");

    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(?e, "metrics accept error"),
            }
        }
    });
    Ok(())
}
