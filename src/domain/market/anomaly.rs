//! Value objects for the microstructure anomaly classifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    WashTrading,
    Spoofing,
    Iceberg,
    MarketMaker,
    DumpBot,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyKind::WashTrading => "WASH_TRADING",
            AnomalyKind::Spoofing => "SPOOFING",
            AnomalyKind::Iceberg => "ICEBERG",
            AnomalyKind::MarketMaker => "MARKET_MAKER",
            AnomalyKind::DumpBot => "DUMP_BOT",
        };
        write!(f, "{}", s)
    }
}

/// Verdict of one heuristic classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalySignal {
    pub kind: AnomalyKind,
    pub detected: bool,
    /// 0-100.
    pub confidence: f64,
    pub evidence: Vec<String>,
}

impl AnomalySignal {
    /// The documented neutral result for a classifier that could not run.
    pub fn not_detected(kind: AnomalyKind) -> Self {
        Self {
            kind,
            detected: false,
            confidence: 0.0,
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(kind: AnomalyKind, confidence: f64, evidence: Vec<String>) -> Self {
        Self {
            kind,
            detected: true,
            confidence: confidence.clamp(0.0, 100.0),
            evidence,
        }
    }
}

/// Net direction of detected block-trade flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDirection {
    Inflow,
    Outflow,
    Neutral,
}

/// Block-trade activity attributed to large players.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstitutionalFlow {
    pub direction: FlowDirection,
    pub block_trades: usize,
    pub buy_blocks: usize,
    pub sell_blocks: usize,
    /// 0-100, weighted highest by the aggregator. 50 is neutral.
    pub score: f64,
    pub evidence: Vec<String>,
}

impl InstitutionalFlow {
    pub fn neutral() -> Self {
        Self {
            direction: FlowDirection::Neutral,
            block_trades: 0,
            buy_blocks: 0,
            sell_blocks: 0,
            score: 50.0,
            evidence: Vec::new(),
        }
    }
}

/// Price-compression-plus-volume pattern associated with large-player
/// positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WyckoffPhase {
    Accumulation,
    Distribution,
    None,
}

/// Combined output of all classifiers over one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyReport {
    pub wash_trading: AnomalySignal,
    pub spoofing: AnomalySignal,
    pub iceberg: AnomalySignal,
    pub market_maker: AnomalySignal,
    pub dump_bot: AnomalySignal,
    pub institutional_flow: InstitutionalFlow,
    pub wyckoff: WyckoffPhase,
}

impl AnomalyReport {
    /// All-neutral report used when inputs are missing entirely.
    pub fn neutral() -> Self {
        Self {
            wash_trading: AnomalySignal::not_detected(AnomalyKind::WashTrading),
            spoofing: AnomalySignal::not_detected(AnomalyKind::Spoofing),
            iceberg: AnomalySignal::not_detected(AnomalyKind::Iceberg),
            market_maker: AnomalySignal::not_detected(AnomalyKind::MarketMaker),
            dump_bot: AnomalySignal::not_detected(AnomalyKind::DumpBot),
            institutional_flow: InstitutionalFlow::neutral(),
            wyckoff: WyckoffPhase::None,
        }
    }

    pub fn signals(&self) -> [&AnomalySignal; 5] {
        [
            &self.wash_trading,
            &self.spoofing,
            &self.iceberg,
            &self.market_maker,
            &self.dump_bot,
        ]
    }
}
