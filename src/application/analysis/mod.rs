//! Analysis core: per-component detectors plus the per-symbol pipeline
//! that validates a snapshot, fans the detectors out, and fuses their
//! verdicts into one assessment.

pub mod aggregator;
pub mod anomalies;
pub mod gaps;
pub mod indicators;
pub mod order_blocks;
pub mod structure;
pub mod volume_profile;
pub mod zones;

use crate::application::analysis::aggregator::{ComponentInputs, SignalAggregator};
use crate::application::analysis::anomalies::MicrostructureAnomalyDetector;
use crate::application::analysis::gaps::GapDetector;
use crate::application::analysis::order_blocks::OrderBlockEngine;
use crate::application::analysis::structure::StructureEngine;
use crate::application::analysis::volume_profile::VolumeProfileEngine;
use crate::application::analysis::zones::ZoneEngine;
use crate::config::AnalysisConfig;
use crate::domain::errors::IngestError;
use crate::domain::market::analysis::Computed;
use crate::domain::market::regime::{MarketRegimeClassifier, RegimeReport};
use crate::domain::market::signal::AggregatedSignal;
use crate::domain::market::types::MarketSnapshot;
use crate::domain::validation::SnapshotValidator;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Full per-symbol result: fused signal plus the independent regime read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SymbolAssessment {
    pub symbol: String,
    pub generated_at: i64,
    pub signal: AggregatedSignal,
    pub regime: Computed<RegimeReport>,
}

/// Stateless per-symbol pipeline. Pure over its input snapshot: the same
/// snapshot always produces the same assessment.
pub struct SymbolAnalyzer {
    volume_profile: VolumeProfileEngine,
    gaps: GapDetector,
    order_blocks: OrderBlockEngine,
    zones: ZoneEngine,
    structure: StructureEngine,
    anomalies: MicrostructureAnomalyDetector,
    aggregator: SignalAggregator,
    regime: MarketRegimeClassifier,
}

impl SymbolAnalyzer {
    pub fn new(cfg: AnalysisConfig) -> Self {
        Self {
            volume_profile: VolumeProfileEngine::new(cfg.volume_profile),
            gaps: GapDetector::new(cfg.gaps),
            order_blocks: OrderBlockEngine::new(cfg.order_blocks),
            zones: ZoneEngine::new(cfg.zones),
            structure: StructureEngine::new(cfg.structure),
            anomalies: MicrostructureAnomalyDetector::new(cfg.anomalies),
            aggregator: SignalAggregator::new(cfg.aggregator),
            regime: MarketRegimeClassifier::new(cfg.regime),
        }
    }

    /// Validate and analyze one snapshot. Malformed data is rejected
    /// before any detector runs; per-component shortfalls degrade to
    /// not-computed fields instead of failing the symbol.
    pub fn analyze(&self, snapshot: &MarketSnapshot) -> Result<SymbolAssessment, IngestError> {
        SnapshotValidator::validate(snapshot)?;

        let generated_at = snapshot
            .candles
            .last()
            .map(|c| c.timestamp)
            .unwrap_or_default();

        let Some(last) = snapshot.candles.last() else {
            return Ok(SymbolAssessment {
                symbol: snapshot.symbol.clone(),
                generated_at,
                signal: AggregatedSignal::insufficient_data("no candles"),
                regime: Computed::InsufficientData { needed: 50, got: 0 },
            });
        };
        let current_price = last.close_f64();
        let candles = &snapshot.candles;

        // Detectors are independent; fan them out across the pool.
        let ((profile, gap_report), ((blocks, zone_report), (structure, regime))) = rayon::join(
            || {
                rayon::join(
                    || self.volume_profile.analyze(candles),
                    || self.gaps.analyze(candles, current_price),
                )
            },
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || self.order_blocks.analyze(candles, current_price),
                            || self.zones.analyze(candles, current_price),
                        )
                    },
                    || {
                        rayon::join(
                            || self.structure.analyze(candles),
                            || self.regime.classify(candles),
                        )
                    },
                )
            },
        );
        let anomalies =
            self.anomalies
                .analyze(candles, &snapshot.trades, &snapshot.order_book);

        let volume_profile = Computed::from_result(profile);
        let price_position = volume_profile
            .value()
            .map(|p| self.volume_profile.classify_position(p, current_price));

        let signal = self.aggregator.aggregate(ComponentInputs {
            candles,
            trades: &snapshot.trades,
            current_price,
            volume_profile,
            price_position,
            gaps: Computed::from_result(gap_report),
            order_blocks: Computed::from_result(blocks),
            zones: Computed::from_result(zone_report),
            structure: Computed::from_result(structure),
            anomalies,
        });

        debug!(
            symbol = %snapshot.symbol,
            signal = %signal.signal,
            confidence = signal.confidence,
            "symbol assessed"
        );

        Ok(SymbolAssessment {
            symbol: snapshot.symbol.clone(),
            generated_at,
            signal,
            regime: Computed::from_result(regime),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::signal::SignalLabel;
    use crate::domain::market::types::{Candle, OrderBookSnapshot};
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(price: f64, ts: i64) -> Candle {
        Candle {
            open: Decimal::from_f64_retain(price).unwrap(),
            high: Decimal::from_f64_retain(price + 0.5).unwrap(),
            low: Decimal::from_f64_retain(price - 0.5).unwrap(),
            close: Decimal::from_f64_retain(price + 0.1).unwrap(),
            volume: Decimal::from_f64_retain(1000.0).unwrap(),
            timestamp: ts,
        }
    }

    fn snapshot(candle_count: usize) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "TESTUSDT".to_string(),
            candles: (0..candle_count)
                .map(|i| candle(100.0 + (i % 5) as f64 * 0.2, i as i64))
                .collect(),
            trades: Vec::new(),
            order_book: OrderBookSnapshot::default(),
        }
    }

    fn analyzer() -> SymbolAnalyzer {
        SymbolAnalyzer::new(AnalysisConfig::default())
    }

    #[test]
    fn test_empty_snapshot_degrades_to_neutral() {
        let assessment = analyzer().analyze(&snapshot(0)).unwrap();
        assert_eq!(assessment.signal.signal, SignalLabel::Neutral);
        assert_eq!(assessment.signal.confidence, 0.0);
        assert!(!assessment.regime.is_ready());
    }

    #[test]
    fn test_short_snapshot_reports_per_component_shortfalls() {
        // 5 candles: below every detector's minimum.
        let assessment = analyzer().analyze(&snapshot(5)).unwrap();
        let breakdown = &assessment.signal.breakdown;
        assert!(!breakdown.volume_profile.is_ready());
        assert!(!breakdown.gaps.is_ready());
        assert!(!breakdown.order_blocks.is_ready());
        assert!(!breakdown.zones.is_ready());
        assert!(!breakdown.structure.is_ready());
        assert_eq!(assessment.signal.direction.total(), 100);
    }

    #[test]
    fn test_full_snapshot_computes_components() {
        let assessment = analyzer().analyze(&snapshot(120)).unwrap();
        let breakdown = &assessment.signal.breakdown;
        assert!(breakdown.volume_profile.is_ready());
        assert!(breakdown.gaps.is_ready());
        assert!(breakdown.order_blocks.is_ready());
        assert!(breakdown.structure.is_ready());
        assert!(assessment.regime.is_ready());
        assert_eq!(assessment.generated_at, 119);
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let mut snap = snapshot(20);
        snap.candles[10].timestamp = 0;
        let err = analyzer().analyze(&snap).unwrap_err();
        assert!(matches!(err, IngestError::NonMonotonicTimestamps { .. }));
    }

    #[test]
    fn test_deterministic_over_same_snapshot() {
        let snap = snapshot(120);
        let analyzer = analyzer();
        let a = analyzer.analyze(&snap).unwrap();
        let b = analyzer.analyze(&snap).unwrap();
        assert_eq!(a, b);
    }
}
