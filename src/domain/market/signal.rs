//! The fused output surface of the analysis core.

use crate::domain::market::analysis::{
    Computed, GapReport, OrderBlockReport, PricePosition, StructureReport, VolumeProfile,
    ZoneReport,
};
use crate::domain::market::anomaly::AnomalyReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final signal label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalLabel {
    StrongPump,
    Pump,
    Neutral,
    Dump,
    StrongDump,
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalLabel::StrongPump => "STRONG_PUMP",
            SignalLabel::Pump => "PUMP",
            SignalLabel::Neutral => "NEUTRAL",
            SignalLabel::Dump => "DUMP",
            SignalLabel::StrongDump => "STRONG_DUMP",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    /// Fixed 30/50/70 thresholds over the clamped risk score.
    pub fn from_score(score: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        if score < 30.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Medium
        } else if score < 70.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }
}

/// Non-negative integer probabilities summing to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionProbability {
    pub up: u8,
    pub down: u8,
    pub sideways: u8,
}

impl DirectionProbability {
    pub fn total(&self) -> u32 {
        self.up as u32 + self.down as u32 + self.sideways as u32
    }

    /// All-sideways distribution used for degraded assessments.
    pub fn undecided() -> Self {
        Self {
            up: 0,
            down: 0,
            sideways: 100,
        }
    }
}

/// Intermediate sub-scores the confidence blend was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubScores {
    pub institutional_flow: f64,
    pub volume_legitimacy: f64,
    pub price_action_quality: f64,
    pub orderbook_manipulation: f64,
    pub bot_penalty: f64,
}

/// Per-component results backing an [`AggregatedSignal`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentBreakdown {
    pub volume_profile: Computed<VolumeProfile>,
    pub price_position: Option<PricePosition>,
    pub gaps: Computed<GapReport>,
    pub order_blocks: Computed<OrderBlockReport>,
    pub zones: Computed<ZoneReport>,
    pub structure: Computed<StructureReport>,
    pub anomalies: AnomalyReport,
    pub scores: SubScores,
}

/// The single decision the core hands to its consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedSignal {
    pub signal: SignalLabel,
    /// 0-100.
    pub confidence: f64,
    pub direction: DirectionProbability,
    pub risk_level: RiskLevel,
    /// Additive risk score behind `risk_level`, clamped to [0, 100].
    pub risk_score: f64,
    pub breakdown: ComponentBreakdown,
    pub recommendation: String,
}

impl AggregatedSignal {
    /// Degraded result for a symbol whose inputs could not be analyzed.
    /// Surfaces as NEUTRAL with confidence 0 and an explicit marker.
    pub fn insufficient_data(reason: &str) -> Self {
        Self {
            signal: SignalLabel::Neutral,
            confidence: 0.0,
            direction: DirectionProbability::undecided(),
            risk_level: RiskLevel::Low,
            risk_score: 0.0,
            breakdown: ComponentBreakdown {
                volume_profile: Computed::InsufficientData { needed: 10, got: 0 },
                price_position: None,
                gaps: Computed::InsufficientData { needed: 10, got: 0 },
                order_blocks: Computed::InsufficientData { needed: 20, got: 0 },
                zones: Computed::InsufficientData { needed: 30, got: 0 },
                structure: Computed::InsufficientData { needed: 20, got: 0 },
                anomalies: AnomalyReport::neutral(),
                scores: SubScores {
                    institutional_flow: 50.0,
                    volume_legitimacy: 50.0,
                    price_action_quality: 50.0,
                    orderbook_manipulation: 0.0,
                    bot_penalty: 0.0,
                },
            },
            recommendation: format!("insufficient data: {}", reason),
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.signal != SignalLabel::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(29.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Extreme);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Extreme);
        // Out-of-range inputs are clamped, not rejected.
        assert_eq!(RiskLevel::from_score(-5.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(250.0), RiskLevel::Extreme);
    }

    #[test]
    fn test_insufficient_data_signal_shape() {
        let signal = AggregatedSignal::insufficient_data("fetch failed");
        assert_eq!(signal.signal, SignalLabel::Neutral);
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.direction.total(), 100);
        assert!(signal.recommendation.contains("insufficient data"));
        assert!(!signal.is_actionable());
    }
}
