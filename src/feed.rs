// ===============================
// src/feed.rs
// ===============================
//
// Mock market data: a random-walk generator (~200 quotes/s per symbol at the
// default pacing) that drives the ingress in demo runs. One thread walks all
// symbols so the quote ring keeps a single producer.

use ahash::AHashMap as HashMap;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

use crate::domain::{now_ns, Quote};
use crate::md::QuoteIngress;

pub struct MockFeed {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MockFeed {
    pub fn spawn(
        mut ingress: QuoteIngress,
        symbols: Vec<String>,
        interval_ms: u64,
        start_px: f64,
    ) -> std::io::Result<MockFeed> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = thread::Builder::new().name("mock-feed".into()).spawn(move || {
            info!(symbols = ?symbols, "mock feed started");
            let mut px: HashMap<String, f64> =
                symbols.iter().map(|s| (s.clone(), start_px)).collect();
            let mut rng = rand::thread_rng();

            while !flag.load(Ordering::Acquire) {
                for (symbol, p) in px.iter_mut() {
                    *p = (*p + rng.gen_range(-0.03..=0.03)).max(1.0);
                    let quote = Quote {
                        symbol: symbol.clone(),
                        bid: *p - 0.01,
                        ask: *p + 0.01,
                        bid_size: rng.gen_range(100.0..1000.0),
                        ask_size: rng.gen_range(100.0..1000.0),
                        ts_ns: now_ns(),
                    };
                    ingress.on_quote(quote);
                }
                thread::sleep(Duration::from_millis(interval_ms.max(1)));
            }
            info!(dropped = ingress.dropped(), "mock feed stopped");
        })?;

        Ok(MockFeed {
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
