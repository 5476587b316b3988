// ===============================
// src/book.rs
// ===============================
//
// Per-symbol top-of-book registry. Books are created lazily on the first
// quote for a symbol and live for the process. Each book guards its top with
// its own mutex, so readers see either the previous or the new quote, never
// a torn one.

use ahash::AHashMap as HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::Quote;

#[derive(Default)]
pub struct OrderBook {
    top: Mutex<Option<Quote>>,
}

impl OrderBook {
    pub fn update(&self, quote: Quote) {
        *self.top.lock().expect("book lock poisoned") = Some(quote);
    }

    pub fn top(&self) -> Option<Quote> {
        self.top.lock().expect("book lock poisoned").clone()
    }
}

#[derive(Default)]
pub struct BookRegistry {
    books: Mutex<HashMap<String, Arc<OrderBook>>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, symbol: &str) -> Arc<OrderBook> {
        let mut books = self.books.lock().expect("registry lock poisoned");
        books
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(OrderBook::default()))
            .clone()
    }

    pub fn update(&self, quote: &Quote) {
        self.book(&quote.symbol).update(quote.clone());
    }

    pub fn top(&self, symbol: &str) -> Option<Quote> {
        let book = {
            let books = self.books.lock().expect("registry lock poisoned");
            books.get(symbol).cloned()
        };
        book.and_then(|b| b.top())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str, bid: f64, ask: f64, ts_ns: i64) -> Quote {
        Quote {
            symbol: symbol.into(),
            bid,
            ask,
            bid_size: 100.0,
            ask_size: 100.0,
            ts_ns,
        }
    }

    #[test]
    fn unknown_symbol_has_no_top() {
        let reg = BookRegistry::new();
        assert!(reg.top("AAPL").is_none());
    }

    #[test]
    fn update_replaces_top() {
        let reg = BookRegistry::new();
        reg.update(&quote("AAPL", 99.0, 101.0, 1));
        reg.update(&quote("AAPL", 100.0, 102.0, 2));
        let top = reg.top("AAPL").unwrap();
        assert_eq!(top.bid, 100.0);
        assert_eq!(top.ask, 102.0);
        assert_eq!(top.ts_ns, 2);
    }

    #[test]
    fn symbols_are_partitioned() {
        let reg = BookRegistry::new();
        reg.update(&quote("AAPL", 99.0, 101.0, 1));
        reg.update(&quote("GOOGL", 10.0, 11.0, 1));
        assert_eq!(reg.top("AAPL").unwrap().bid, 99.0);
        assert_eq!(reg.top("GOOGL").unwrap().bid, 10.0);
    }
}
