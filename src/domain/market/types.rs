use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of the aggressor (taker) in a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakerSide {
    Buy,
    Sell,
}

impl fmt::Display for TakerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TakerSide::Buy => write!(f, "BUY"),
            TakerSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Single OHLCV bar. Series are ordered ascending by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

impl Candle {
    pub fn open_f64(&self) -> f64 {
        self.open.to_f64().unwrap_or(0.0)
    }

    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(0.0)
    }

    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(0.0)
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(0.0)
    }

    /// True when close > open.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// True when close < open.
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Single executed trade from the tape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub price: Decimal,
    pub qty: Decimal,
    pub timestamp: i64,
    pub taker_side: TakerSide,
}

impl Trade {
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    pub fn qty_f64(&self) -> f64 {
        self.qty.to_f64().unwrap_or(0.0)
    }
}

/// One price level of the order book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookLevel {
    pub price: Decimal,
    pub qty: Decimal,
}

impl BookLevel {
    pub fn price_f64(&self) -> f64 {
        self.price.to_f64().unwrap_or(0.0)
    }

    pub fn qty_f64(&self) -> f64 {
        self.qty.to_f64().unwrap_or(0.0)
    }
}

/// Point-in-time order book: bids sorted descending, asks ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Total quantity resting in the top `depth` levels of both sides.
    pub fn depth_qty(&self, depth: usize) -> f64 {
        let bid_qty: f64 = self.bids.iter().take(depth).map(|l| l.qty_f64()).sum();
        let ask_qty: f64 = self.asks.iter().take(depth).map(|l| l.qty_f64()).sum();
        bid_qty + ask_qty
    }
}

/// Immutable per-symbol input bundle handed to the analysis core.
///
/// All I/O happens before this is constructed; detectors never fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub candles: Vec<Candle>,
    pub trades: Vec<Trade>,
    pub order_book: OrderBookSnapshot,
}
