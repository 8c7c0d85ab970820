//! Value objects produced by the analysis core.
//!
//! Everything here is an immutable result built fresh per call and
//! serializable to JSON for the UI/API collaborators. Status fields
//! (gap fill, block mitigation, zone break) only ever move forward;
//! re-running a detector on identical input reproduces the same states.

use crate::domain::errors::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional reading attached to structural objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Bias {
    Bullish,
    Bearish,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Bullish => write!(f, "BULLISH"),
            Bias::Bearish => write!(f, "BEARISH"),
        }
    }
}

/// Lookback scale a structural detector ran at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scale {
    Swing,
    Internal,
}

/// Tagged result for a component output: distinguishes "not computed"
/// from "computed as empty/zero" so callers cannot misread missing data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Computed<T> {
    Ready { value: T },
    InsufficientData { needed: usize, got: usize },
    Degenerate { reason: String },
}

impl<T> Computed<T> {
    pub fn from_result(result: Result<T, AnalysisError>) -> Self {
        match result {
            Ok(value) => Computed::Ready { value },
            Err(AnalysisError::InsufficientData { needed, got, .. }) => {
                Computed::InsufficientData { needed, got }
            }
            Err(AnalysisError::DegenerateInput { reason }) => Computed::Degenerate { reason },
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Computed::Ready { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Computed::Ready { .. })
    }
}

/// One price bucket of a volume profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeLevel {
    /// Midpoint price of the bucket.
    pub price: f64,
    pub volume: f64,
}

/// Volume-at-price distribution with Point of Control and Value Area.
///
/// Invariant: `val <= poc <= vah`, and the value area holds at least the
/// configured fraction of total volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeProfile {
    pub poc: f64,
    pub vah: f64,
    pub val: f64,
    pub levels: Vec<VolumeLevel>,
    pub high_volume_nodes: Vec<VolumeLevel>,
    pub low_volume_nodes: Vec<VolumeLevel>,
    pub total_volume: f64,
}

/// Where the current price sits relative to the value area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricePosition {
    /// Above VAH: longs are paying up.
    Premium,
    /// Below VAL: price is cheap relative to accepted value.
    Discount,
    /// Within 0.5% of the POC.
    AtPoc,
    /// Inside the value area.
    ValueArea,
}

impl PricePosition {
    /// Directional lean the position implies, if any.
    pub fn bias(&self) -> Option<Bias> {
        match self {
            PricePosition::Premium => Some(Bias::Bearish),
            PricePosition::Discount => Some(Bias::Bullish),
            PricePosition::AtPoc | PricePosition::ValueArea => None,
        }
    }
}

/// Fill state of a fair value gap. One-way: ACTIVE -> FILLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapStatus {
    Active,
    Filled,
}

/// Fair value gap left by a 3-candle imbalance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gap {
    pub direction: Bias,
    pub top: f64,
    pub bottom: f64,
    pub midpoint: f64,
    pub size_pct: f64,
    pub bar_index: usize,
    pub status: GapStatus,
}

/// Active gaps split by direction, nearest to current price first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GapReport {
    pub bullish: Vec<Gap>,
    pub bearish: Vec<Gap>,
}

/// Mitigation state of an order block. One-way: ACTIVE -> MITIGATED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderBlockStatus {
    Active,
    Mitigated,
}

/// Last opposite candle before a structure break, read as an
/// institutional footprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBlock {
    pub scale: Scale,
    pub bias: Bias,
    pub top: f64,
    pub bottom: f64,
    pub bar_index: usize,
    pub status: OrderBlockStatus,
}

/// Active order blocks per lookback scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBlockReport {
    pub swing: Computed<Vec<OrderBlock>>,
    pub internal: Computed<Vec<OrderBlock>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneKind {
    Support,
    Resistance,
}

/// Break state of a zone. One-way chain: ACTIVE -> BROKEN -> BROKEN_RETESTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneStatus {
    Active,
    Broken,
    BrokenRetested,
}

/// High-volume support/resistance box anchored at a pivot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Zone {
    pub kind: ZoneKind,
    pub price: f64,
    pub top: f64,
    pub bottom: f64,
    pub volume_ratio: f64,
    pub delta_volume: f64,
    pub bar_index: usize,
    pub status: ZoneStatus,
}

/// Active zones per side, nearest to current price first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ZoneReport {
    pub support: Vec<Zone>,
    pub resistance: Vec<Zone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwingKind {
    High,
    Low,
}

/// Local extreme confirmed by a symmetric lookback/lookahead window.
/// Never revised once emitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwingPoint {
    pub price: f64,
    pub bar_index: usize,
    pub kind: SwingKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureEventKind {
    /// Break of structure: trend continuation.
    Bos,
    /// Change of character: trend reversal.
    Choch,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureEvent {
    pub kind: StructureEventKind,
    pub bias: Bias,
    pub price: f64,
    pub bar_index: usize,
    pub scale: Scale,
}

/// Cluster of swing highs (or lows) at near-identical prices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EqualLevelCluster {
    pub kind: SwingKind,
    pub mean_price: f64,
    pub prices: Vec<f64>,
    pub bar_indices: Vec<usize>,
}

/// Structure findings for one lookback scale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleStructure {
    pub scale: Scale,
    pub trend: Option<Bias>,
    pub events: Vec<StructureEvent>,
    pub swing_points: Vec<SwingPoint>,
    pub equal_highs: Vec<EqualLevelCluster>,
    pub equal_lows: Vec<EqualLevelCluster>,
}

/// Agreement between swing- and internal-scale trends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureBias {
    BullishAligned,
    BearishAligned,
    Divergent { swing: Bias, internal: Bias },
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureReport {
    pub swing: Computed<ScaleStructure>,
    pub internal: Computed<ScaleStructure>,
    pub bias: StructureBias,
    /// 0-100, from recent BOS/CHoCH counts by direction. 50 is neutral.
    pub bias_confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_from_insufficient_data() {
        let err: Result<Vec<Gap>, AnalysisError> =
            Err(AnalysisError::insufficient_candles(10, 3));
        let computed = Computed::from_result(err);
        assert!(!computed.is_ready());
        assert_eq!(
            computed,
            Computed::InsufficientData { needed: 10, got: 3 }
        );
    }

    #[test]
    fn test_price_position_bias() {
        assert_eq!(PricePosition::Premium.bias(), Some(Bias::Bearish));
        assert_eq!(PricePosition::Discount.bias(), Some(Bias::Bullish));
        assert_eq!(PricePosition::AtPoc.bias(), None);
    }

    #[test]
    fn test_computed_serde_tagging() {
        let ready: Computed<Vec<f64>> = Computed::Ready { value: vec![1.0] };
        let json = serde_json::to_string(&ready).unwrap();
        assert!(json.contains("READY"));
        let missing: Computed<Vec<f64>> = Computed::InsufficientData { needed: 5, got: 1 };
        let json = serde_json::to_string(&missing).unwrap();
        assert!(json.contains("INSUFFICIENT_DATA"));
    }
}
