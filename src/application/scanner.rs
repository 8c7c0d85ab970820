//! Cross-symbol market sweep.
//!
//! Each cycle fetches and analyzes every configured symbol through a
//! semaphore-bounded worker pool. The bound reflects the upstream rate
//! budget, not CPU count. One symbol failing upstream or failing
//! validation degrades to a neutral assessment; the rest of the cycle is
//! untouched.

use crate::application::analysis::{SymbolAnalyzer, SymbolAssessment};
use crate::domain::market::analysis::Computed;
use crate::domain::market::signal::AggregatedSignal;
use crate::domain::market::types::MarketSnapshot;
use crate::domain::ports::{CooldownStore, MarketDataService};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{info, warn};

const BOOK_DEPTH: usize = 50;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub symbols: Vec<String>,
    pub max_concurrency: usize,
    pub candle_limit: usize,
    pub trade_limit: usize,
}

pub struct MarketSweep {
    market_data: Arc<dyn MarketDataService>,
    cooldowns: Arc<dyn CooldownStore>,
    analyzer: Arc<SymbolAnalyzer>,
    cfg: SweepConfig,
}

impl MarketSweep {
    pub fn new(
        market_data: Arc<dyn MarketDataService>,
        cooldowns: Arc<dyn CooldownStore>,
        analyzer: Arc<SymbolAnalyzer>,
        cfg: SweepConfig,
    ) -> Self {
        Self {
            market_data,
            cooldowns,
            analyzer,
            cfg,
        }
    }

    /// Run one full cycle over the configured symbols. Cancellable between
    /// symbols via the shutdown channel; symbols already in flight finish.
    pub async fn run_cycle(
        &self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Vec<SymbolAssessment>> {
        let semaphore = Arc::new(Semaphore::new(self.cfg.max_concurrency.max(1)));
        let mut workers: JoinSet<SymbolAssessment> = JoinSet::new();

        for symbol in &self.cfg.symbols {
            if *shutdown.borrow() {
                info!("shutdown requested, not scheduling remaining symbols");
                break;
            }
            let symbol = symbol.clone();
            let semaphore = Arc::clone(&semaphore);
            let market_data = Arc::clone(&self.market_data);
            let analyzer = Arc::clone(&self.analyzer);
            let candle_limit = self.cfg.candle_limit;
            let trade_limit = self.cfg.trade_limit;

            workers.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("sweep semaphore closed mid-cycle");
                analyze_symbol(&*market_data, analyzer, &symbol, candle_limit, trade_limit).await
            });
        }

        let mut assessments = Vec::with_capacity(self.cfg.symbols.len());
        while let Some(joined) = workers.join_next().await {
            let assessment = joined?;
            self.maybe_alert(&assessment);
            assessments.push(assessment);
        }
        assessments.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(assessments)
    }

    fn maybe_alert(&self, assessment: &SymbolAssessment) {
        if !assessment.signal.is_actionable() {
            return;
        }
        let now = Utc::now().timestamp();
        if self.cooldowns.should_alert(&assessment.symbol, now) {
            self.cooldowns.mark_alerted(&assessment.symbol, now);
            info!(
                symbol = %assessment.symbol,
                signal = %assessment.signal.signal,
                confidence = assessment.signal.confidence,
                risk = ?assessment.signal.risk_level,
                "signal alert"
            );
        }
    }
}

async fn analyze_symbol(
    market_data: &dyn MarketDataService,
    analyzer: Arc<SymbolAnalyzer>,
    symbol: &str,
    candle_limit: usize,
    trade_limit: usize,
) -> SymbolAssessment {
    let snapshot = match fetch_snapshot(market_data, symbol, candle_limit, trade_limit).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(symbol, error = %err, "fetch failed, degrading symbol");
            return degraded(symbol, &format!("fetch failed: {err}"));
        }
    };

    // The detector fan-out is CPU-bound; keep it off the async workers.
    let joined = tokio::task::spawn_blocking(move || analyzer.analyze(&snapshot)).await;
    match joined {
        Ok(Ok(assessment)) => assessment,
        Ok(Err(err)) => {
            warn!(symbol, error = %err, "snapshot rejected, degrading symbol");
            degraded(symbol, &format!("invalid data: {err}"))
        }
        Err(err) => {
            warn!(symbol, error = %err, "analysis task failed, degrading symbol");
            degraded(symbol, "analysis task failed")
        }
    }
}

async fn fetch_snapshot(
    market_data: &dyn MarketDataService,
    symbol: &str,
    candle_limit: usize,
    trade_limit: usize,
) -> Result<MarketSnapshot> {
    let candles = market_data.fetch_candles(symbol, candle_limit).await?;
    let trades = market_data.fetch_trades(symbol, trade_limit).await?;
    let order_book = market_data.fetch_order_book(symbol, BOOK_DEPTH).await?;
    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        candles,
        trades,
        order_book,
    })
}

fn degraded(symbol: &str, reason: &str) -> SymbolAssessment {
    SymbolAssessment {
        symbol: symbol.to_string(),
        generated_at: Utc::now().timestamp(),
        signal: AggregatedSignal::insufficient_data(reason),
        regime: Computed::InsufficientData { needed: 50, got: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::domain::market::signal::SignalLabel;
    use crate::infrastructure::mock::MockMarketDataService;
    use crate::infrastructure::stores::InMemoryCooldownStore;
    use std::time::Duration;

    fn sweep(service: MockMarketDataService, symbols: &[&str]) -> MarketSweep {
        MarketSweep::new(
            Arc::new(service),
            Arc::new(InMemoryCooldownStore::new(Duration::from_secs(900))),
            Arc::new(SymbolAnalyzer::new(AnalysisConfig::default())),
            SweepConfig {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                max_concurrency: 2,
                candle_limit: 200,
                trade_limit: 200,
            },
        )
    }

    #[tokio::test]
    async fn test_cycle_covers_all_symbols() {
        let sweep = sweep(MockMarketDataService::new(), &["AUSDT", "BUSDT", "CUSDT"]);
        let (_tx, rx) = watch::channel(false);
        let results = sweep.run_cycle(&rx).await.unwrap();
        assert_eq!(results.len(), 3);
        let mut symbols: Vec<&str> = results.iter().map(|a| a.symbol.as_str()).collect();
        symbols.sort();
        assert_eq!(symbols, vec!["AUSDT", "BUSDT", "CUSDT"]);
    }

    #[tokio::test]
    async fn test_failing_symbol_degrades_without_aborting_cycle() {
        let service = MockMarketDataService::with_failures(&["BADUSDT"]);
        let sweep = sweep(service, &["AUSDT", "BADUSDT", "CUSDT"]);
        let (_tx, rx) = watch::channel(false);
        let results = sweep.run_cycle(&rx).await.unwrap();
        assert_eq!(results.len(), 3);

        let bad = results.iter().find(|a| a.symbol == "BADUSDT").unwrap();
        assert_eq!(bad.signal.signal, SignalLabel::Neutral);
        assert_eq!(bad.signal.confidence, 0.0);
        assert!(bad.signal.recommendation.contains("insufficient data"));

        let good = results.iter().find(|a| a.symbol == "AUSDT").unwrap();
        assert!(good.signal.breakdown.volume_profile.is_ready());
    }

    #[tokio::test]
    async fn test_shutdown_before_cycle_schedules_nothing() {
        let sweep = sweep(MockMarketDataService::new(), &["AUSDT", "BUSDT"]);
        let (tx, rx) = watch::channel(true);
        let results = sweep.run_cycle(&rx).await.unwrap();
        assert!(results.is_empty());
        drop(tx);
    }
}
