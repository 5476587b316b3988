// ===============================
// src/md.rs
// ===============================
//
// Market-data handler: one bounded SPSC ring for the ingress and one
// consumer worker. The producer side is the QuoteIngress handle, owned by
// whatever feeds the engine; it never blocks, dropping (and counting) quotes
// when the ring is full or the quote breaks the bid<=ask invariant. The
// consumer updates the book registry and hands the quote to the maker, so
// per-symbol updates are observed in arrival order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::book::BookRegistry;
use crate::domain::Quote;
use crate::maker::MarketMaker;
use crate::metrics;
use crate::queue::{spsc, Consumer, Producer};

const SPIN_LIMIT: u32 = 64;
const POLL_SLEEP: Duration = Duration::from_millis(1);

/// Producer-side handle into the quote ring. Single owner, single thread.
pub struct QuoteIngress {
    tx: Producer<Quote>,
    dropped: Arc<AtomicU64>,
}

impl QuoteIngress {
    pub fn on_quote(&mut self, quote: Quote) {
        if !quote.is_valid() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::QUOTES_DROPPED.inc();
            return;
        }
        match self.tx.push(quote) {
            Ok(()) => metrics::QUOTES.inc(),
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::QUOTES_DROPPED.inc();
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct MarketDataHandler {
    rx_slot: Mutex<Option<Consumer<Quote>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    books: Arc<BookRegistry>,
    maker: Arc<MarketMaker>,
}

impl MarketDataHandler {
    pub fn new(
        capacity: usize,
        books: Arc<BookRegistry>,
        maker: Arc<MarketMaker>,
    ) -> (Self, QuoteIngress) {
        let (tx, rx) = spsc(capacity);
        let handler = Self {
            rx_slot: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
            books,
            maker,
        };
        let ingress = QuoteIngress {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (handler, ingress)
    }

    pub fn start(&self) -> std::io::Result<()> {
        let Some(mut rx) = self.rx_slot.lock().expect("md rx lock poisoned").take() else {
            return Ok(()); // already started
        };
        let shutdown = self.shutdown.clone();
        let books = self.books.clone();
        let maker = self.maker.clone();

        let handle = thread::Builder::new().name("md-handler".into()).spawn(move || {
            let mut idle: u32 = 0;
            while !shutdown.load(Ordering::Acquire) {
                match rx.pop() {
                    Some(quote) => {
                        idle = 0;
                        books.update(&quote);
                        maker.update_quotes(&quote.symbol, &quote);
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
        *self.worker.lock().expect("md worker lock poisoned") = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.worker.lock().expect("md worker lock poisoned").take() {
            let _ = handle.join();
        }
    }
}
