//! Fuses every component verdict into one [`AggregatedSignal`].
//!
//! The blend is deliberately transparent: each sub-score is kept in the
//! breakdown so a consumer can audit exactly why a symbol scored the way
//! it did.

use crate::application::analysis::indicators::{coefficient_of_variation, mean, vwap};
use crate::domain::market::analysis::{
    Computed, GapReport, OrderBlockReport, PricePosition, StructureBias, StructureReport,
    VolumeProfile, ZoneReport,
};
use crate::domain::market::anomaly::{AnomalyReport, FlowDirection, WyckoffPhase};
use crate::domain::market::signal::{
    AggregatedSignal, ComponentBreakdown, DirectionProbability, RiskLevel, SignalLabel, SubScores,
};
use crate::domain::market::types::{Candle, TakerSide, Trade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub flow_weight: f64,
    pub volume_weight: f64,
    pub price_action_weight: f64,
    pub manipulation_weight: f64,
    pub bot_weight: f64,
    /// Confidence floor for STRONG_PUMP / STRONG_DUMP.
    pub strong_confidence: f64,
    /// Directional probability floor for STRONG_PUMP / STRONG_DUMP.
    pub strong_direction: u8,
    pub signal_confidence: f64,
    pub signal_direction: u8,
    /// Volume legitimacy below this counts as illegitimate volume.
    pub illegitimate_volume_below: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            flow_weight: 0.35,
            volume_weight: 0.25,
            price_action_weight: 0.20,
            manipulation_weight: 0.15,
            bot_weight: 0.05,
            strong_confidence: 75.0,
            strong_direction: 70,
            signal_confidence: 65.0,
            signal_direction: 60,
            illegitimate_volume_below: 40.0,
        }
    }
}

/// Everything the aggregator fuses for one symbol.
pub struct ComponentInputs<'a> {
    pub candles: &'a [Candle],
    pub trades: &'a [Trade],
    pub current_price: f64,
    pub volume_profile: Computed<VolumeProfile>,
    pub price_position: Option<PricePosition>,
    pub gaps: Computed<GapReport>,
    pub order_blocks: Computed<OrderBlockReport>,
    pub zones: Computed<ZoneReport>,
    pub structure: Computed<StructureReport>,
    pub anomalies: AnomalyReport,
}

pub struct SignalAggregator {
    cfg: AggregatorConfig,
}

impl SignalAggregator {
    pub fn new(cfg: AggregatorConfig) -> Self {
        Self { cfg }
    }

    pub fn aggregate(&self, inputs: ComponentInputs<'_>) -> AggregatedSignal {
        let scores = self.sub_scores(&inputs);
        let confidence = self.blend_confidence(&scores);
        let direction = self.direction(&inputs, &scores);
        let risk_score = self.risk_score(&inputs, &scores);
        let risk_level = RiskLevel::from_score(risk_score);
        let signal = self.label(confidence, direction);
        let recommendation = recommendation_text(signal, risk_level, &inputs.anomalies);

        AggregatedSignal {
            signal,
            confidence,
            direction,
            risk_level,
            risk_score,
            breakdown: ComponentBreakdown {
                volume_profile: inputs.volume_profile,
                price_position: inputs.price_position,
                gaps: inputs.gaps,
                order_blocks: inputs.order_blocks,
                zones: inputs.zones,
                structure: inputs.structure,
                anomalies: inputs.anomalies,
                scores,
            },
            recommendation,
        }
    }

    fn sub_scores(&self, inputs: &ComponentInputs<'_>) -> SubScores {
        SubScores {
            institutional_flow: inputs.anomalies.institutional_flow.score,
            volume_legitimacy: self.volume_legitimacy(inputs),
            price_action_quality: self.price_action_quality(inputs),
            orderbook_manipulation: if inputs.anomalies.spoofing.detected {
                inputs.anomalies.spoofing.confidence
            } else {
                0.0
            },
            bot_penalty: bot_penalty(&inputs.anomalies),
        }
    }

    /// Weighted blend; manipulation and bot activity count inverted.
    fn blend_confidence(&self, scores: &SubScores) -> f64 {
        let blended = scores.institutional_flow * self.cfg.flow_weight
            + scores.volume_legitimacy * self.cfg.volume_weight
            + scores.price_action_quality * self.cfg.price_action_weight
            + (100.0 - scores.orderbook_manipulation) * self.cfg.manipulation_weight
            + (100.0 - scores.bot_penalty) * self.cfg.bot_weight;
        blended.clamp(0.0, 100.0)
    }

    /// How organic the traded volume looks, 0-100 around a neutral 50.
    fn volume_legitimacy(&self, inputs: &ComponentInputs<'_>) -> f64 {
        let mut score = 50.0;

        if inputs.anomalies.wash_trading.detected {
            score -= inputs.anomalies.wash_trading.confidence * 0.4;
        }

        if let Some(vwap_price) = vwap(inputs.trades) {
            if vwap_price > 0.0 && inputs.current_price > 0.0 {
                let deviation = ((inputs.current_price - vwap_price) / vwap_price).abs();
                if deviation < 0.01 {
                    score += 10.0;
                } else if deviation > 0.03 {
                    score -= 10.0;
                }
            }
        }

        let total_qty: f64 = inputs.trades.iter().map(|t| t.qty_f64()).sum();
        if total_qty > 0.0 {
            let buy_qty: f64 = inputs
                .trades
                .iter()
                .filter(|t| t.taker_side == TakerSide::Buy)
                .map(|t| t.qty_f64())
                .sum();
            let buy_fraction = buy_qty / total_qty;
            if (0.35..=0.65).contains(&buy_fraction) {
                score += 10.0;
            } else if !(0.2..=0.8).contains(&buy_fraction) {
                score -= 10.0;
            }

            let sizes: Vec<f64> = inputs.trades.iter().map(|t| t.qty_f64()).collect();
            let mean_size = mean(&sizes);
            if mean_size > 0.0 {
                let large_qty: f64 = sizes.iter().filter(|&&s| s > mean_size * 3.0).sum();
                let large_fraction = large_qty / total_qty;
                if (0.1..=0.5).contains(&large_fraction) {
                    score += 10.0;
                } else if large_fraction > 0.7 {
                    score -= 10.0;
                }
            }

            // Near-identical sizes read as scripted flow.
            if let Some(size_cv) = coefficient_of_variation(&sizes) {
                if size_cv < 0.2 {
                    score -= 15.0;
                } else if size_cv > 0.8 {
                    score += 10.0;
                }
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// Zone respect plus smoothness of candle-to-candle returns.
    fn price_action_quality(&self, inputs: &ComponentInputs<'_>) -> f64 {
        let mut score = 50.0;

        if let Some(zones) = inputs.zones.value() {
            let respected = zones.support.len() + zones.resistance.len();
            score += (respected as f64 * 5.0).min(20.0);
        }

        let returns: Vec<f64> = inputs
            .candles
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].close_f64();
                if prev > 0.0 {
                    Some(((w[1].close_f64() - prev) / prev).abs())
                } else {
                    None
                }
            })
            .collect();
        if let Some(cv) = coefficient_of_variation(&returns) {
            if cv < 1.0 {
                score += 15.0;
            } else if cv > 2.5 {
                score -= 15.0;
            }
        }

        score.clamp(0.0, 100.0)
    }

    /// Up/down/sideways weights from directional evidence, renormalized to
    /// integers summing exactly 100.
    fn direction(&self, inputs: &ComponentInputs<'_>, scores: &SubScores) -> DirectionProbability {
        let mut up = 50.0f64;
        let mut down = 50.0f64;
        let mut sideways = 50.0f64;

        match inputs.anomalies.wyckoff {
            WyckoffPhase::Accumulation => {
                up += 20.0;
                down -= 10.0;
                sideways -= 10.0;
            }
            WyckoffPhase::Distribution => {
                down += 20.0;
                up -= 10.0;
                sideways -= 10.0;
            }
            WyckoffPhase::None => {}
        }

        match inputs.anomalies.institutional_flow.direction {
            FlowDirection::Inflow => {
                up += 15.0;
                down -= 10.0;
            }
            FlowDirection::Outflow => {
                down += 15.0;
                up -= 10.0;
            }
            FlowDirection::Neutral => {}
        }

        if inputs.anomalies.dump_bot.detected {
            down += 15.0;
            up -= 10.0;
        }

        if scores.volume_legitimacy < self.cfg.illegitimate_volume_below {
            sideways += 10.0;
            down += 5.0;
            up -= 15.0;
        }

        if let Some(structure) = inputs.structure.value() {
            match structure.bias {
                StructureBias::BullishAligned => {
                    up += 10.0;
                    down -= 5.0;
                }
                StructureBias::BearishAligned => {
                    down += 10.0;
                    up -= 5.0;
                }
                StructureBias::Divergent { .. } | StructureBias::Neutral => {}
            }
        }

        match inputs.price_position {
            Some(PricePosition::Discount) => up += 5.0,
            Some(PricePosition::Premium) => down += 5.0,
            _ => {}
        }

        normalize_direction(up, down, sideways)
    }

    /// Additive risk from detected manipulation, offset by institutional
    /// participation.
    fn risk_score(&self, inputs: &ComponentInputs<'_>, scores: &SubScores) -> f64 {
        let mut risk: f64 = 0.0;
        let anomalies = &inputs.anomalies;
        if anomalies.wash_trading.detected {
            risk += 25.0;
        }
        if anomalies.spoofing.detected {
            risk += 20.0;
        }
        if anomalies.dump_bot.detected {
            risk += 30.0;
        }
        if scores.orderbook_manipulation >= 50.0 {
            risk += 20.0;
        }
        if scores.volume_legitimacy < self.cfg.illegitimate_volume_below {
            risk += 15.0;
        }
        if anomalies.institutional_flow.direction != FlowDirection::Neutral {
            risk -= 20.0;
        }
        risk.clamp(0.0, 100.0)
    }

    fn label(&self, confidence: f64, direction: DirectionProbability) -> SignalLabel {
        if confidence >= self.cfg.strong_confidence {
            if direction.up >= self.cfg.strong_direction {
                return SignalLabel::StrongPump;
            }
            if direction.down >= self.cfg.strong_direction {
                return SignalLabel::StrongDump;
            }
        }
        if confidence >= self.cfg.signal_confidence {
            if direction.up >= self.cfg.signal_direction {
                return SignalLabel::Pump;
            }
            if direction.down >= self.cfg.signal_direction {
                return SignalLabel::Dump;
            }
        }
        SignalLabel::Neutral
    }
}

fn bot_penalty(anomalies: &AnomalyReport) -> f64 {
    let mut penalty = 0.0;
    if anomalies.dump_bot.detected {
        penalty += anomalies.dump_bot.confidence * 0.6;
    }
    if anomalies.iceberg.detected {
        penalty += anomalies.iceberg.confidence * 0.3;
    }
    penalty.clamp(0.0, 100.0)
}

/// Largest-remainder rounding so the integer buckets always sum to 100.
fn normalize_direction(up: f64, down: f64, sideways: f64) -> DirectionProbability {
    let raw = [up.max(0.0), down.max(0.0), sideways.max(0.0)];
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return DirectionProbability::undecided();
    }

    let scaled: Vec<f64> = raw.iter().map(|w| w / total * 100.0).collect();
    let mut ints: Vec<u8> = scaled.iter().map(|s| s.floor() as u8).collect();
    let assigned: u32 = ints.iter().map(|&i| i as u32).sum();
    let mut remainder = 100 - assigned as i32;

    let mut order: Vec<usize> = (0..3).collect();
    order.sort_by(|&a, &b| {
        let fa = scaled[a] - scaled[a].floor();
        let fb = scaled[b] - scaled[b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().cycle() {
        if remainder == 0 {
            break;
        }
        ints[i] += 1;
        remainder -= 1;
    }

    DirectionProbability {
        up: ints[0],
        down: ints[1],
        sideways: ints[2],
    }
}

fn recommendation_text(
    signal: SignalLabel,
    risk: RiskLevel,
    anomalies: &AnomalyReport,
) -> String {
    let base = match signal {
        SignalLabel::StrongPump => "strong accumulation evidence; upside continuation likely",
        SignalLabel::Pump => "bullish lean; upside favored while flow persists",
        SignalLabel::Neutral => "no directional edge; stand aside",
        SignalLabel::Dump => "bearish lean; downside favored while selling persists",
        SignalLabel::StrongDump => "strong distribution evidence; downside continuation likely",
    };
    let mut text = String::from(base);
    match risk {
        RiskLevel::High => text.push_str("; elevated manipulation risk"),
        RiskLevel::Extreme => text.push_str("; extreme manipulation risk, treat as untradeable"),
        _ => {}
    }
    if anomalies.wash_trading.detected {
        text.push_str("; printed volume is suspect");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::analysis::{ScaleStructure, Scale};
    use crate::domain::market::anomaly::{AnomalyKind, AnomalySignal, InstitutionalFlow};
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64, ts: i64) -> Candle {
        Candle {
            open: Decimal::from_f64_retain(open).unwrap(),
            high: Decimal::from_f64_retain(high).unwrap(),
            low: Decimal::from_f64_retain(low).unwrap(),
            close: Decimal::from_f64_retain(close).unwrap(),
            volume: Decimal::from_f64_retain(volume).unwrap(),
            timestamp: ts,
        }
    }

    fn trade(qty: f64, ts: i64, side: TakerSide) -> Trade {
        Trade {
            price: Decimal::from_f64_retain(100.0).unwrap(),
            qty: Decimal::from_f64_retain(qty).unwrap(),
            timestamp: ts,
            taker_side: side,
        }
    }

    fn quiet_candles() -> Vec<Candle> {
        (0..30)
            .map(|i| {
                let jitter = (i % 4) as f64 * 0.1;
                candle(
                    100.0 + jitter,
                    100.5 + jitter,
                    99.5 + jitter,
                    100.1 + jitter,
                    1000.0,
                    i,
                )
            })
            .collect()
    }

    fn mixed_trades() -> Vec<Trade> {
        (0..60)
            .map(|i| {
                let side = if i % 2 == 0 { TakerSide::Buy } else { TakerSide::Sell };
                trade(1.0 + (i % 7) as f64, i, side)
            })
            .collect()
    }

    fn neutral_inputs<'a>(candles: &'a [Candle], trades: &'a [Trade]) -> ComponentInputs<'a> {
        ComponentInputs {
            candles,
            trades,
            current_price: 100.0,
            volume_profile: Computed::InsufficientData { needed: 10, got: 0 },
            price_position: None,
            gaps: Computed::Ready {
                value: GapReport::default(),
            },
            order_blocks: Computed::InsufficientData { needed: 20, got: 0 },
            zones: Computed::Ready {
                value: ZoneReport::default(),
            },
            structure: Computed::InsufficientData { needed: 20, got: 0 },
            anomalies: AnomalyReport::neutral(),
        }
    }

    fn aggregator() -> SignalAggregator {
        SignalAggregator::new(AggregatorConfig::default())
    }

    #[test]
    fn test_neutral_inputs_give_neutral_signal() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let signal = aggregator().aggregate(neutral_inputs(&candles, &trades));
        assert_eq!(signal.signal, SignalLabel::Neutral);
        assert_eq!(signal.direction.total(), 100);
        assert_eq!(signal.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_direction_always_sums_to_100() {
        for (up, down, side) in [
            (50.0, 50.0, 50.0),
            (85.0, 40.0, 30.0),
            (0.0, 0.0, 0.0),
            (33.3, 33.3, 33.3),
            (1.0, 2.0, 4.0),
        ] {
            let d = normalize_direction(up, down, side);
            assert_eq!(d.total(), 100, "({up}, {down}, {side})");
        }
    }

    #[test]
    fn test_negative_weights_clamped_before_normalizing() {
        let d = normalize_direction(-20.0, 60.0, 40.0);
        assert_eq!(d.up, 0);
        assert_eq!(d.total(), 100);
    }

    #[test]
    fn test_accumulation_and_inflow_lean_bullish() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let mut inputs = neutral_inputs(&candles, &trades);
        inputs.anomalies.wyckoff = WyckoffPhase::Accumulation;
        inputs.anomalies.institutional_flow = InstitutionalFlow {
            direction: FlowDirection::Inflow,
            block_trades: 8,
            buy_blocks: 7,
            sell_blocks: 1,
            score: 85.0,
            evidence: vec!["8 block trades".to_string()],
        };
        inputs.structure = Computed::Ready {
            value: StructureReport {
                swing: Computed::InsufficientData { needed: 110, got: 30 },
                internal: Computed::Ready {
                    value: ScaleStructure {
                        scale: Scale::Internal,
                        trend: Some(crate::domain::market::analysis::Bias::Bullish),
                        events: Vec::new(),
                        swing_points: Vec::new(),
                        equal_highs: Vec::new(),
                        equal_lows: Vec::new(),
                    },
                },
                bias: StructureBias::BullishAligned,
                bias_confidence: 65.0,
            },
        };
        inputs.price_position = Some(PricePosition::Discount);

        let signal = aggregator().aggregate(inputs);
        assert!(signal.direction.up > signal.direction.down);
        assert!(signal.confidence > 50.0);
        // Institutional participation offsets risk.
        assert_eq!(signal.risk_score, 0.0);
    }

    #[test]
    fn test_dump_bot_drives_bearish_and_risky() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let mut inputs = neutral_inputs(&candles, &trades);
        inputs.anomalies.dump_bot = AnomalySignal::with_evidence(
            AnomalyKind::DumpBot,
            80.0,
            vec!["15/20 down candles".to_string()],
        );
        inputs.anomalies.wyckoff = WyckoffPhase::Distribution;

        let signal = aggregator().aggregate(inputs);
        assert!(signal.direction.down > signal.direction.up);
        assert!(signal.risk_score >= 30.0);
        assert!(matches!(
            signal.risk_level,
            RiskLevel::Medium | RiskLevel::High | RiskLevel::Extreme
        ));
    }

    #[test]
    fn test_wash_trading_raises_risk_and_cuts_legitimacy() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let mut inputs = neutral_inputs(&candles, &trades);
        inputs.anomalies.wash_trading = AnomalySignal::with_evidence(
            AnomalyKind::WashTrading,
            70.0,
            vec!["volume 3.0x trailing mean".to_string()],
        );

        let signal = aggregator().aggregate(inputs);
        assert!(signal.risk_score >= 25.0);
        assert!(signal.breakdown.scores.volume_legitimacy < 50.0);
        assert!(signal.recommendation.contains("volume is suspect"));
    }

    #[test]
    fn test_spoofing_feeds_manipulation_score() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let mut inputs = neutral_inputs(&candles, &trades);
        inputs.anomalies.spoofing = AnomalySignal::with_evidence(
            AnomalyKind::Spoofing,
            75.0,
            vec!["depth 6x traded".to_string()],
        );

        let signal = aggregator().aggregate(inputs);
        assert_eq!(signal.breakdown.scores.orderbook_manipulation, 75.0);
        assert!(signal.risk_score >= 40.0);
    }

    #[test]
    fn test_serde_round_trip() {
        let candles = quiet_candles();
        let trades = mixed_trades();
        let signal = aggregator().aggregate(neutral_inputs(&candles, &trades));
        let json = serde_json::to_string(&signal).unwrap();
        let back: AggregatedSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signal);
    }
}
