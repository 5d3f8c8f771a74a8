//! Order book tracking - synthetic per-symbol books and resting levels
//!
//! The venue owns real matching; this book exists so resting limit orders
//! are visible to queries and so executions can be journaled against the
//! state of the touch at fill time.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

use crate::core::{BookLevel, BookSnapshot, Side, Symbol};

const BOOK_VENUE: &str = "SIMX";
const LADDER_DEPTH: usize = 10;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic per-symbol base price, so books are stable across calls
/// without any market data.
fn base_price(symbol: &Symbol) -> f64 {
    let mut hasher = DefaultHasher::new();
    symbol.as_str().hash(&mut hasher);
    100.0 + (hasher.finish() % 200) as f64
}

fn seed_book(symbol: &Symbol) -> BookSnapshot {
    let now = Utc::now();
    let base = base_price(symbol);
    let mut bids = Vec::with_capacity(LADDER_DEPTH);
    let mut asks = Vec::with_capacity(LADDER_DEPTH);
    for i in 0..LADDER_DEPTH {
        let step = (i as f64) * 0.01 + (i as f64) * 0.001;
        let size = std::cmp::max(100, 1_000 - (i as u64) * 50);
        bids.push(BookLevel {
            price: round2(base - step),
            size,
            venue: BOOK_VENUE.into(),
            timestamp: now,
        });
        asks.push(BookLevel {
            price: round2(base + step),
            size,
            venue: BOOK_VENUE.into(),
            timestamp: now,
        });
    }
    BookSnapshot {
        symbol: symbol.clone(),
        timestamp: now,
        bids,
        asks,
        last_price: Some(base),
        volume: 10_000 + rand::random::<u64>() % 90_000,
    }
}

pub struct OrderBooks {
    books: Mutex<HashMap<Symbol, BookSnapshot>>,
}

impl OrderBooks {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(HashMap::new()),
        }
    }

    /// Current book for a symbol, seeding a synthetic ladder on first use.
    pub fn snapshot(&self, symbol: &Symbol) -> BookSnapshot {
        let mut books = self.books.lock();
        books
            .entry(symbol.clone())
            .or_insert_with(|| seed_book(symbol))
            .clone()
    }

    /// Add a resting level when a limit/stop-limit order is routed.
    pub fn add_level(&self, symbol: &Symbol, side: Side, price: f64, size: u64) {
        let mut books = self.books.lock();
        let book = books
            .entry(symbol.clone())
            .or_insert_with(|| seed_book(symbol));
        let now = Utc::now();
        let level = BookLevel {
            price,
            size,
            venue: BOOK_VENUE.into(),
            timestamp: now,
        };
        match side {
            Side::Buy => {
                book.bids.push(level);
                book.bids.sort_by(|a, b| {
                    b.price
                        .partial_cmp(&a.price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            Side::Sell => {
                book.asks.push(level);
                book.asks.sort_by(|a, b| {
                    a.price
                        .partial_cmp(&b.price)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        book.timestamp = now;
    }

    /// Remove the matching resting level after a fill.
    pub fn remove_level(&self, symbol: &Symbol, side: Side, price: f64, size: u64) {
        let mut books = self.books.lock();
        let Some(book) = books.get_mut(symbol) else {
            return;
        };
        let matches = |l: &BookLevel| l.price == price && l.size == size;
        match side {
            Side::Buy => book.bids.retain(|l| !matches(l)),
            Side::Sell => book.asks.retain(|l| !matches(l)),
        }
        book.timestamp = Utc::now();
    }
}

impl Default for OrderBooks {
    fn default() -> Self {
        Self::new()
    }
}
