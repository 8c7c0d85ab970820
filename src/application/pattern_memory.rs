//! Hit-rate statistics over past signal outcomes.
//!
//! Read-only consumer of the history store; nothing here feeds back into
//! the detectors.

use crate::domain::market::signal::SignalLabel;
use crate::domain::ports::{HistoryStore, Outcome};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Win/loss record for one signal label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabelStats {
    pub label: SignalLabel,
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub flats: usize,
    /// wins / (wins + losses); flat outcomes are excluded. `None` when no
    /// outcome was decided.
    pub hit_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternStats {
    pub total: usize,
    pub by_label: Vec<LabelStats>,
}

impl PatternStats {
    pub fn label(&self, label: SignalLabel) -> Option<&LabelStats> {
        self.by_label.iter().find(|s| s.label == label)
    }
}

pub struct PatternMemory {
    history: Arc<dyn HistoryStore>,
}

impl PatternMemory {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    /// Hit rates for one symbol over the trailing window.
    pub async fn symbol_stats(
        &self,
        symbol: &str,
        scope: &str,
        days: u32,
    ) -> Result<PatternStats> {
        let outcomes = self.history.symbol_history(symbol, scope, days).await?;
        Ok(tally(outcomes.iter().map(|o| (o.signal, o.outcome))))
    }

    /// Hit rates pooled across symbols, for judging a label overall.
    pub async fn cross_symbol_stats(
        &self,
        symbols: &[String],
        scope: &str,
        days: u32,
    ) -> Result<PatternStats> {
        let mut pooled = Vec::new();
        for symbol in symbols {
            let outcomes = self.history.symbol_history(symbol, scope, days).await?;
            pooled.extend(outcomes.into_iter().map(|o| (o.signal, o.outcome)));
        }
        Ok(tally(pooled.into_iter()))
    }
}

const LABELS: [SignalLabel; 5] = [
    SignalLabel::StrongPump,
    SignalLabel::Pump,
    SignalLabel::Neutral,
    SignalLabel::Dump,
    SignalLabel::StrongDump,
];

fn tally(outcomes: impl Iterator<Item = (SignalLabel, Outcome)>) -> PatternStats {
    let mut by_label: Vec<LabelStats> = LABELS
        .iter()
        .map(|&label| LabelStats {
            label,
            total: 0,
            wins: 0,
            losses: 0,
            flats: 0,
            hit_rate: None,
        })
        .collect();

    let mut total = 0usize;
    for (label, outcome) in outcomes {
        total += 1;
        let stats = by_label
            .iter_mut()
            .find(|s| s.label == label)
            .expect("all labels pre-seeded");
        stats.total += 1;
        match outcome {
            Outcome::Win => stats.wins += 1,
            Outcome::Loss => stats.losses += 1,
            Outcome::Flat => stats.flats += 1,
        }
    }

    for stats in &mut by_label {
        let decided = stats.wins + stats.losses;
        if decided > 0 {
            stats.hit_rate = Some(stats.wins as f64 / decided as f64);
        }
    }
    by_label.retain(|s| s.total > 0);

    PatternStats { total, by_label }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::HistoricalOutcome;
    use crate::infrastructure::stores::InMemoryHistoryStore;

    fn outcome(symbol: &str, signal: SignalLabel, result: Outcome, ts: i64) -> HistoricalOutcome {
        HistoricalOutcome {
            symbol: symbol.to_string(),
            signal,
            confidence: 70.0,
            timestamp: ts,
            outcome: result,
        }
    }

    fn seeded_store() -> Arc<InMemoryHistoryStore> {
        let store = InMemoryHistoryStore::new();
        let base = 86_400 * 100;
        store.record("1h", outcome("BTCUSDT", SignalLabel::Pump, Outcome::Win, base));
        store.record("1h", outcome("BTCUSDT", SignalLabel::Pump, Outcome::Win, base + 60));
        store.record("1h", outcome("BTCUSDT", SignalLabel::Pump, Outcome::Loss, base + 120));
        store.record("1h", outcome("BTCUSDT", SignalLabel::Pump, Outcome::Flat, base + 180));
        store.record("1h", outcome("BTCUSDT", SignalLabel::Dump, Outcome::Win, base + 240));
        store.record("1h", outcome("ETHUSDT", SignalLabel::Pump, Outcome::Loss, base + 300));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_symbol_stats_exclude_flats_from_hit_rate() {
        let memory = PatternMemory::new(seeded_store());
        let stats = memory.symbol_stats("BTCUSDT", "1h", 30).await.unwrap();
        assert_eq!(stats.total, 5);

        let pump = stats.label(SignalLabel::Pump).unwrap();
        assert_eq!(pump.total, 4);
        assert_eq!(pump.flats, 1);
        // 2 wins / 3 decided.
        assert!((pump.hit_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cross_symbol_pooling() {
        let memory = PatternMemory::new(seeded_store());
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let stats = memory.cross_symbol_stats(&symbols, "1h", 30).await.unwrap();
        assert_eq!(stats.total, 6);
        let pump = stats.label(SignalLabel::Pump).unwrap();
        // 2 wins / 4 decided across both symbols.
        assert!((pump.hit_rate.unwrap() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unseen_labels_are_omitted() {
        let memory = PatternMemory::new(seeded_store());
        let stats = memory.symbol_stats("BTCUSDT", "1h", 30).await.unwrap();
        assert!(stats.label(SignalLabel::StrongDump).is_none());
    }
}
