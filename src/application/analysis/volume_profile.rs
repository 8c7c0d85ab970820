//! Volume-at-price distribution: Point of Control, Value Area, volume nodes.

use crate::domain::errors::AnalysisError;
use crate::domain::market::analysis::{PricePosition, VolumeLevel, VolumeProfile};
use crate::domain::market::types::Candle;
use serde::{Deserialize, Serialize};

pub const MIN_CANDLES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeProfileConfig {
    pub bucket_count: usize,
    /// Target fraction of total volume inside the value area.
    pub value_area_fraction: f64,
    /// Bucket volume above this multiple of the average is a high-volume node.
    pub high_node_multiplier: f64,
    /// Bucket volume below this multiple of the average is a low-volume node.
    pub low_node_multiplier: f64,
    pub max_nodes: usize,
    /// Half-width, as a fraction of POC, of the AT_POC band.
    pub poc_proximity_pct: f64,
}

impl Default for VolumeProfileConfig {
    fn default() -> Self {
        Self {
            bucket_count: 25,
            value_area_fraction: 0.68,
            high_node_multiplier: 1.5,
            low_node_multiplier: 0.5,
            max_nodes: 5,
            poc_proximity_pct: 0.5,
        }
    }
}

pub struct VolumeProfileEngine {
    cfg: VolumeProfileConfig,
}

impl VolumeProfileEngine {
    pub fn new(cfg: VolumeProfileConfig) -> Self {
        Self { cfg }
    }

    pub fn analyze(&self, candles: &[Candle]) -> Result<VolumeProfile, AnalysisError> {
        if candles.len() < MIN_CANDLES {
            return Err(AnalysisError::insufficient_candles(
                MIN_CANDLES,
                candles.len(),
            ));
        }

        let min_low = candles
            .iter()
            .map(|c| c.low_f64())
            .fold(f64::INFINITY, f64::min);
        let max_high = candles
            .iter()
            .map(|c| c.high_f64())
            .fold(f64::NEG_INFINITY, f64::max);
        let range = max_high - min_low;
        if range <= 0.0 {
            return Err(AnalysisError::degenerate("flat price range"));
        }

        let n = self.cfg.bucket_count.max(1);
        let width = range / n as f64;
        let mut buckets = vec![0.0f64; n];

        // Spread each candle's volume evenly across every bucket its
        // [low, high] range touches.
        for candle in candles {
            let low = candle.low_f64();
            let high = candle.high_f64();
            let volume = candle.volume_f64();
            let lo_idx = (((low - min_low) / width).floor() as usize).min(n - 1);
            let hi_idx = (((high - min_low) / width).floor() as usize).min(n - 1);
            let touched = (hi_idx - lo_idx + 1) as f64;
            let share = volume / touched;
            for bucket in buckets.iter_mut().take(hi_idx + 1).skip(lo_idx) {
                *bucket += share;
            }
        }

        let total_volume: f64 = buckets.iter().sum();
        if total_volume <= 0.0 {
            return Err(AnalysisError::degenerate("zero total volume"));
        }

        let poc_idx = buckets
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);

        // Expand from the POC toward whichever neighbor currently holds
        // more volume until the target fraction is reached.
        let target = total_volume * self.cfg.value_area_fraction;
        let mut lo = poc_idx;
        let mut hi = poc_idx;
        let mut cumulative = buckets[poc_idx];
        while cumulative < target && (lo > 0 || hi < n - 1) {
            let below = if lo > 0 { Some(buckets[lo - 1]) } else { None };
            let above = if hi < n - 1 { Some(buckets[hi + 1]) } else { None };
            match (below, above) {
                (Some(b), Some(a)) if b >= a => {
                    lo -= 1;
                    cumulative += b;
                }
                (Some(_), Some(a)) => {
                    hi += 1;
                    cumulative += a;
                }
                (Some(b), None) => {
                    lo -= 1;
                    cumulative += b;
                }
                (None, Some(a)) => {
                    hi += 1;
                    cumulative += a;
                }
                (None, None) => break,
            }
        }

        let midpoint = |idx: usize| min_low + (idx as f64 + 0.5) * width;
        let poc = midpoint(poc_idx);
        let val = min_low + lo as f64 * width;
        let vah = min_low + (hi + 1) as f64 * width;

        let levels: Vec<VolumeLevel> = buckets
            .iter()
            .enumerate()
            .map(|(i, &volume)| VolumeLevel {
                price: midpoint(i),
                volume,
            })
            .collect();

        let avg_bucket = total_volume / n as f64;
        let mut high_nodes: Vec<VolumeLevel> = levels
            .iter()
            .filter(|l| l.volume > avg_bucket * self.cfg.high_node_multiplier)
            .cloned()
            .collect();
        high_nodes.sort_by(|a, b| b.volume.partial_cmp(&a.volume).unwrap_or(std::cmp::Ordering::Equal));
        high_nodes.truncate(self.cfg.max_nodes);

        let mut low_nodes: Vec<VolumeLevel> = levels
            .iter()
            .filter(|l| l.volume < avg_bucket * self.cfg.low_node_multiplier)
            .cloned()
            .collect();
        low_nodes.sort_by(|a, b| a.volume.partial_cmp(&b.volume).unwrap_or(std::cmp::Ordering::Equal));
        low_nodes.truncate(self.cfg.max_nodes);

        Ok(VolumeProfile {
            poc,
            vah,
            val,
            levels,
            high_volume_nodes: high_nodes,
            low_volume_nodes: low_nodes,
            total_volume,
        })
    }

    /// Classify where `price` sits relative to the profile.
    pub fn classify_position(&self, profile: &VolumeProfile, price: f64) -> PricePosition {
        if profile.poc > 0.0 {
            let distance_pct = ((price - profile.poc) / profile.poc).abs() * 100.0;
            if distance_pct <= self.cfg.poc_proximity_pct {
                return PricePosition::AtPoc;
            }
        }
        if price > profile.vah {
            PricePosition::Premium
        } else if price < profile.val {
            PricePosition::Discount
        } else {
            PricePosition::ValueArea
        }
    }
}
