//! In-memory implementations of the persistence ports.

use crate::domain::ports::{CooldownStore, HistoricalOutcome, HistoryStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Alert cooldown map with TTL eviction. Shared across scan workers
/// behind an `Arc`.
pub struct InMemoryCooldownStore {
    ttl_secs: i64,
    last_alerts: Mutex<HashMap<String, i64>>,
}

impl InMemoryCooldownStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl_secs: ttl.as_secs() as i64,
            last_alerts: Mutex::new(HashMap::new()),
        }
    }
}

impl CooldownStore for InMemoryCooldownStore {
    fn should_alert(&self, symbol: &str, now: i64) -> bool {
        let mut map = self.last_alerts.lock().expect("cooldown map poisoned");
        // Expired entries are dropped on the way through.
        map.retain(|_, &mut at| now - at < self.ttl_secs);
        !map.contains_key(symbol)
    }

    fn mark_alerted(&self, symbol: &str, now: i64) {
        let mut map = self.last_alerts.lock().expect("cooldown map poisoned");
        map.insert(symbol.to_string(), now);
    }
}

/// Append-only analysis history, scoped by timeframe tag.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<Vec<(String, HistoricalOutcome)>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, scope: &str, outcome: HistoricalOutcome) {
        let mut records = self.records.lock().expect("history store poisoned");
        records.push((scope.to_string(), outcome));
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn symbol_history(
        &self,
        symbol: &str,
        scope: &str,
        days: u32,
    ) -> Result<Vec<HistoricalOutcome>> {
        let records = self.records.lock().expect("history store poisoned");
        let newest = records
            .iter()
            .map(|(_, o)| o.timestamp)
            .max()
            .unwrap_or_default();
        let cutoff = newest - i64::from(days) * 86_400;
        Ok(records
            .iter()
            .filter(|(s, o)| s == scope && o.symbol == symbol && o.timestamp >= cutoff)
            .map(|(_, o)| o.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::signal::SignalLabel;
    use crate::domain::ports::Outcome;

    #[test]
    fn test_cooldown_blocks_within_ttl() {
        let store = InMemoryCooldownStore::new(Duration::from_secs(900));
        assert!(store.should_alert("BTCUSDT", 1000));
        store.mark_alerted("BTCUSDT", 1000);
        assert!(!store.should_alert("BTCUSDT", 1500));
        // Other symbols are unaffected.
        assert!(store.should_alert("ETHUSDT", 1500));
    }

    #[test]
    fn test_cooldown_expires_after_ttl() {
        let store = InMemoryCooldownStore::new(Duration::from_secs(900));
        store.mark_alerted("BTCUSDT", 1000);
        assert!(!store.should_alert("BTCUSDT", 1899));
        assert!(store.should_alert("BTCUSDT", 1901));
    }

    fn outcome(symbol: &str, ts: i64, result: Outcome) -> HistoricalOutcome {
        HistoricalOutcome {
            symbol: symbol.to_string(),
            signal: SignalLabel::Pump,
            confidence: 70.0,
            timestamp: ts,
            outcome: result,
        }
    }

    #[tokio::test]
    async fn test_history_filters_symbol_scope_and_window() {
        let store = InMemoryHistoryStore::new();
        store.record("1h", outcome("BTCUSDT", 86_400 * 10, Outcome::Win));
        store.record("1h", outcome("BTCUSDT", 0, Outcome::Loss)); // too old
        store.record("4h", outcome("BTCUSDT", 86_400 * 10, Outcome::Win)); // wrong scope
        store.record("1h", outcome("ETHUSDT", 86_400 * 10, Outcome::Win)); // wrong symbol

        let hits = store.symbol_history("BTCUSDT", "1h", 7).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].outcome, Outcome::Win);
    }
}
