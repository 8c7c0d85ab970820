//! Swing structure: BOS/CHoCH events, trend state, and equal-high/low
//! clusters at swing and internal scales.

use crate::application::analysis::indicators::pivot_indices;
use crate::domain::errors::AnalysisError;
use crate::domain::market::analysis::{
    Bias, Computed, EqualLevelCluster, Scale, ScaleStructure, StructureBias, StructureEvent,
    StructureEventKind, StructureReport, SwingKind, SwingPoint,
};
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    pub swing_length: usize,
    pub internal_length: usize,
    /// Pairwise relative tolerance for equal-high/low clustering.
    pub equal_level_tolerance_pct: f64,
    /// Events within this many bars of the end count as "recent" for the
    /// bias confidence score.
    pub recent_event_window: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swing_length: 33,
            internal_length: 5,
            equal_level_tolerance_pct: 0.5,
            recent_event_window: 100,
        }
    }
}

impl StructureConfig {
    pub fn min_candles(length: usize) -> usize {
        length * 2 + 10
    }
}

/// Tracked swing level with a crossed flag so each level fires one event.
#[derive(Debug, Clone, Copy)]
struct Level {
    price: f64,
    crossed: bool,
}

pub struct StructureEngine {
    cfg: StructureConfig,
}

impl StructureEngine {
    pub fn new(cfg: StructureConfig) -> Self {
        Self { cfg }
    }

    /// Run both scales. Errs only when even the internal scale lacks data.
    pub fn analyze(&self, candles: &[Candle]) -> Result<StructureReport, AnalysisError> {
        let internal_min = StructureConfig::min_candles(self.cfg.internal_length);
        if candles.len() < internal_min {
            return Err(AnalysisError::insufficient_candles(
                internal_min,
                candles.len(),
            ));
        }

        let internal = Computed::from_result(
            self.run_scale(candles, Scale::Internal, self.cfg.internal_length),
        );
        let swing =
            Computed::from_result(self.run_scale(candles, Scale::Swing, self.cfg.swing_length));

        let bias = structure_bias(&swing, &internal);
        let bias_confidence = self.bias_confidence(candles.len(), &swing, &internal);

        Ok(StructureReport {
            swing,
            internal,
            bias,
            bias_confidence,
        })
    }

    fn run_scale(
        &self,
        candles: &[Candle],
        scale: Scale,
        length: usize,
    ) -> Result<ScaleStructure, AnalysisError> {
        let min = StructureConfig::min_candles(length);
        if candles.len() < min {
            return Err(AnalysisError::insufficient_candles(min, candles.len()));
        }

        let pivot_highs = pivot_indices(candles, length, true);
        let pivot_lows = pivot_indices(candles, length, false);

        let mut swing_points: Vec<SwingPoint> = Vec::new();
        for &p in &pivot_highs {
            swing_points.push(SwingPoint {
                price: candles[p].high_f64(),
                bar_index: p,
                kind: SwingKind::High,
            });
        }
        for &p in &pivot_lows {
            swing_points.push(SwingPoint {
                price: candles[p].low_f64(),
                bar_index: p,
                kind: SwingKind::Low,
            });
        }
        swing_points.sort_by_key(|s| s.bar_index);

        // Replay the bars, promoting pivots as their confirmation windows
        // elapse, and classify every level break as BOS or CHoCH.
        let mut next_high = 0usize;
        let mut next_low = 0usize;
        let mut last_high: Option<Level> = None;
        let mut prev_high: Option<Level> = None;
        let mut last_low: Option<Level> = None;
        let mut prev_low: Option<Level> = None;
        let mut trend: Option<Bias> = None;
        let mut events: Vec<StructureEvent> = Vec::new();

        for i in length..candles.len() {
            let confirm_at = i.saturating_sub(length);
            while next_high < pivot_highs.len() && pivot_highs[next_high] <= confirm_at {
                prev_high = last_high;
                last_high = Some(Level {
                    price: candles[pivot_highs[next_high]].high_f64(),
                    crossed: false,
                });
                next_high += 1;
            }
            while next_low < pivot_lows.len() && pivot_lows[next_low] <= confirm_at {
                prev_low = last_low;
                last_low = Some(Level {
                    price: candles[pivot_lows[next_low]].low_f64(),
                    crossed: false,
                });
                next_low += 1;
            }

            let close = candles[i].close_f64();

            // Continuation: while already bullish, a close above the
            // previous swing high is a BOS.
            if trend == Some(Bias::Bullish) {
                if let Some(level) = prev_high.as_mut() {
                    if !level.crossed && close > level.price {
                        level.crossed = true;
                        events.push(StructureEvent {
                            kind: StructureEventKind::Bos,
                            bias: Bias::Bullish,
                            price: level.price,
                            bar_index: i,
                            scale,
                        });
                    }
                }
            }
            if trend == Some(Bias::Bearish) {
                if let Some(level) = prev_low.as_mut() {
                    if !level.crossed && close < level.price {
                        level.crossed = true;
                        events.push(StructureEvent {
                            kind: StructureEventKind::Bos,
                            bias: Bias::Bearish,
                            price: level.price,
                            bar_index: i,
                            scale,
                        });
                    }
                }
            }

            // Reversal: a close through the current swing level against the
            // trend (or with no trend yet) is a CHoCH and flips the trend.
            if trend != Some(Bias::Bullish) {
                if let Some(level) = last_high.as_mut() {
                    if !level.crossed && close > level.price {
                        level.crossed = true;
                        events.push(StructureEvent {
                            kind: StructureEventKind::Choch,
                            bias: Bias::Bullish,
                            price: level.price,
                            bar_index: i,
                            scale,
                        });
                        trend = Some(Bias::Bullish);
                    }
                }
            }
            if trend != Some(Bias::Bearish) {
                if let Some(level) = last_low.as_mut() {
                    if !level.crossed && close < level.price {
                        level.crossed = true;
                        events.push(StructureEvent {
                            kind: StructureEventKind::Choch,
                            bias: Bias::Bearish,
                            price: level.price,
                            bar_index: i,
                            scale,
                        });
                        trend = Some(Bias::Bearish);
                    }
                }
            }
        }

        let highs: Vec<&SwingPoint> = swing_points
            .iter()
            .filter(|s| s.kind == SwingKind::High)
            .collect();
        let lows: Vec<&SwingPoint> = swing_points
            .iter()
            .filter(|s| s.kind == SwingKind::Low)
            .collect();
        let equal_highs =
            cluster_levels(&highs, SwingKind::High, self.cfg.equal_level_tolerance_pct);
        let equal_lows = cluster_levels(&lows, SwingKind::Low, self.cfg.equal_level_tolerance_pct);

        Ok(ScaleStructure {
            scale,
            trend,
            events,
            swing_points,
            equal_highs,
            equal_lows,
        })
    }

    /// 0-100 score from recent event counts: bullish events push above 50,
    /// bearish below. CHoCH weighs more than BOS.
    fn bias_confidence(
        &self,
        series_len: usize,
        swing: &Computed<ScaleStructure>,
        internal: &Computed<ScaleStructure>,
    ) -> f64 {
        let cutoff = series_len.saturating_sub(self.cfg.recent_event_window);
        let mut score: f64 = 50.0;
        for structure in [swing, internal].into_iter().flat_map(|c| c.value()) {
            for event in structure.events.iter().filter(|e| e.bar_index >= cutoff) {
                let weight = match event.kind {
                    StructureEventKind::Bos => 10.0,
                    StructureEventKind::Choch => 15.0,
                };
                match event.bias {
                    Bias::Bullish => score += weight,
                    Bias::Bearish => score -= weight,
                }
            }
        }
        score.clamp(0.0, 100.0)
    }
}

fn structure_bias(
    swing: &Computed<ScaleStructure>,
    internal: &Computed<ScaleStructure>,
) -> StructureBias {
    match (
        swing.value().and_then(|s| s.trend),
        internal.value().and_then(|s| s.trend),
    ) {
        (Some(Bias::Bullish), Some(Bias::Bullish)) => StructureBias::BullishAligned,
        (Some(Bias::Bearish), Some(Bias::Bearish)) => StructureBias::BearishAligned,
        (Some(swing), Some(internal)) => StructureBias::Divergent { swing, internal },
        _ => StructureBias::Neutral,
    }
}

/// Group swing levels whose pairwise relative spread stays within the
/// tolerance; clusters need at least two members.
fn cluster_levels(
    points: &[&SwingPoint],
    kind: SwingKind,
    tolerance_pct: f64,
) -> Vec<EqualLevelCluster> {
    if points.len() < 2 {
        return Vec::new();
    }
    let mut sorted: Vec<&SwingPoint> = points.to_vec();
    sorted.sort_by(|a, b| {
        a.price
            .partial_cmp(&b.price)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut clusters = Vec::new();
    let mut start = 0usize;
    for i in 1..=sorted.len() {
        let closes_group = i == sorted.len() || {
            let anchor = sorted[start].price;
            anchor > 0.0 && (sorted[i].price - anchor) / anchor * 100.0 > tolerance_pct
        };
        if closes_group {
            if i - start >= 2 {
                let members = &sorted[start..i];
                let mean_price =
                    members.iter().map(|s| s.price).sum::<f64>() / members.len() as f64;
                clusters.push(EqualLevelCluster {
                    kind,
                    mean_price,
                    prices: members.iter().map(|s| s.price).collect(),
                    bar_indices: members.iter().map(|s| s.bar_index).collect(),
                });
            }
            start = i;
        }
    }
    clusters
}
