//! Synthetic market data source for development and tests.

use crate::domain::ports::MarketDataService;
use crate::domain::market::types::{BookLevel, Candle, OrderBookSnapshot, TakerSide, Trade};
use anyhow::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic per symbol: the same symbol always yields the same tape,
/// so tests can assert on derived results.
pub struct MockMarketDataService {
    failure_symbols: HashSet<String>,
}

impl MockMarketDataService {
    pub fn new() -> Self {
        Self {
            failure_symbols: HashSet::new(),
        }
    }

    /// Symbols whose fetches fail, for exercising degraded paths.
    pub fn with_failures(symbols: &[&str]) -> Self {
        Self {
            failure_symbols: symbols.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn rng_for(symbol: &str) -> StdRng {
        let mut hasher = DefaultHasher::new();
        symbol.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    fn fail_if_configured(&self, symbol: &str) -> Result<()> {
        if self.failure_symbols.contains(symbol) {
            anyhow::bail!("simulated upstream failure for {}", symbol);
        }
        Ok(())
    }

    fn base_price(rng: &mut StdRng) -> f64 {
        rng.random_range(1.0..500.0)
    }
}

impl Default for MockMarketDataService {
    fn default() -> Self {
        Self::new()
    }
}

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

#[async_trait]
impl MarketDataService for MockMarketDataService {
    async fn fetch_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        self.fail_if_configured(symbol)?;
        let mut rng = Self::rng_for(symbol);
        let mut price = Self::base_price(&mut rng);
        let mut candles = Vec::with_capacity(limit);
        for i in 0..limit {
            let drift: f64 = rng.random_range(-0.01..0.011);
            let open = price;
            let close = (price * (1.0 + drift)).max(0.01);
            let high = open.max(close) * (1.0 + rng.random_range(0.0..0.005));
            let low = (open.min(close) * (1.0 - rng.random_range(0.0..0.005))).max(0.01);
            let volume = rng.random_range(500.0..5000.0);
            candles.push(Candle {
                open: dec(open),
                high: dec(high),
                low: dec(low),
                close: dec(close),
                volume: dec(volume),
                timestamp: i as i64 * 60,
            });
            price = close;
        }
        Ok(candles)
    }

    async fn fetch_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>> {
        self.fail_if_configured(symbol)?;
        let mut rng = Self::rng_for(symbol);
        let price = Self::base_price(&mut rng);
        let mut trades = Vec::with_capacity(limit);
        for i in 0..limit {
            let taker_side = if rng.random_bool(0.5) {
                TakerSide::Buy
            } else {
                TakerSide::Sell
            };
            trades.push(Trade {
                price: dec(price * (1.0 + rng.random_range(-0.002..0.002))),
                qty: dec(rng.random_range(0.1..20.0)),
                timestamp: i as i64 * 97 + rng.random_range(0..50i64),
                taker_side,
            });
        }
        Ok(trades)
    }

    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot> {
        self.fail_if_configured(symbol)?;
        let mut rng = Self::rng_for(symbol);
        let mid = Self::base_price(&mut rng);
        let tick = mid * 0.0005;
        let mut bids = Vec::with_capacity(depth);
        let mut asks = Vec::with_capacity(depth);
        for i in 0..depth {
            bids.push(BookLevel {
                price: dec(mid - tick * (i + 1) as f64),
                qty: dec(rng.random_range(0.5..50.0)),
            });
            asks.push(BookLevel {
                price: dec(mid + tick * (i + 1) as f64),
                qty: dec(rng.random_range(0.5..50.0)),
            });
        }
        Ok(OrderBookSnapshot { bids, asks })
    }
}
