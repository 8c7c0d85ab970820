use crate::domain::market::signal::SignalLabel;
use crate::domain::market::types::{Candle, OrderBookSnapshot, Trade};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Need async_trait for async functions in traits
#[async_trait]
pub trait MarketDataService: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;
    async fn fetch_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>>;
    async fn fetch_order_book(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot>;
}

/// How a past signal resolved once its window elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Win,
    Loss,
    Flat,
}

/// One persisted analysis with its eventual outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalOutcome {
    pub symbol: String,
    pub signal: SignalLabel,
    pub confidence: f64,
    pub timestamp: i64,
    pub outcome: Outcome,
}

/// Read-only view of the persisted analysis history. Consumed only by
/// pattern memory; the core never writes through this.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn symbol_history(
        &self,
        symbol: &str,
        scope: &str,
        days: u32,
    ) -> Result<Vec<HistoricalOutcome>>;
}

/// Alert-cooldown bookkeeping, injected so scan workers share one store.
///
/// Contract: `should_alert` answers whether the symbol's last alert is
/// older than the TTL; `mark_alerted` records `now` for the symbol and
/// must be atomic per symbol. Implementations evict expired entries.
pub trait CooldownStore: Send + Sync {
    fn should_alert(&self, symbol: &str, now: i64) -> bool;
    fn mark_alerted(&self, symbol: &str, now: i64);
}
